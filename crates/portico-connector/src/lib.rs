//! # portico-connector
//!
//! The contract between the flow orchestrator and upstream identity
//! backends ("connectors").
//!
//! A connector declares one login shape — redirect/callback or
//! username/password — and may additionally support refreshing a stored
//! identity without user interaction. The orchestrator discovers
//! capabilities through the accessor methods on [`Connector`]; that dispatch
//! is the only place connector variance leaks into the control flow.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod mock;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by connectors.
///
/// A failed password check is *not* an error — password connectors report it
/// through their return value so the user can be re-prompted.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connector is misconfigured.
    #[error("connector configuration error: {0}")]
    Config(String),

    /// The upstream identity backend failed.
    #[error("upstream identity backend error: {0}")]
    Upstream(String),

    /// The inbound callback request was malformed or carried an upstream
    /// error response.
    #[error("callback error: {0}")]
    Callback(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// An authenticated end user, as reported by a connector.
///
/// Ephemeral: the orchestrator copies it into the grant's claims and never
/// persists it as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend-assigned user identifier, unique within the connector.
    pub user_id: String,

    /// Display username.
    pub username: String,

    /// Email address.
    pub email: String,

    /// Whether the backend verified the email.
    pub email_verified: bool,

    /// Group memberships.
    pub groups: Vec<String>,

    /// Opaque bytes the connector wants carried through the grant, handed
    /// back on refresh. Treated as opaque everywhere except here.
    #[serde(default)]
    pub connector_data: Vec<u8>,
}

/// The authorized scopes a connector should honor, reduced to what
/// connectors care about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scopes {
    /// The grant wants a refresh token; the connector should request
    /// long-lived upstream credentials if it needs them.
    pub offline_access: bool,

    /// The grant wants group memberships resolved.
    pub groups: bool,
}

impl Scopes {
    /// Reduces a raw OAuth scope list to connector scopes.
    #[must_use]
    pub fn from_scope_list<S: AsRef<str>>(scopes: &[S]) -> Self {
        let mut out = Self::default();
        for scope in scopes {
            match scope.as_ref() {
                "offline_access" => out.offline_access = true,
                "groups" => out.groups = true,
                _ => {}
            }
        }
        out
    }
}

/// The inbound callback request, reduced to the query parameters the
/// connector needs to complete the upstream exchange.
#[derive(Debug, Clone, Default)]
pub struct CallbackData {
    /// Decoded query parameters of the callback URL.
    pub query: HashMap<String, String>,
}

impl CallbackData {
    /// Returns a query parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// A registered identity backend.
///
/// Implementations advertise their capabilities by overriding the accessor
/// for each shape they support; the defaults advertise nothing.
pub trait Connector: Send + Sync {
    /// The redirect/callback login shape, if supported.
    fn as_callback(&self) -> Option<&dyn CallbackConnector> {
        None
    }

    /// The username/password login shape, if supported.
    fn as_password(&self) -> Option<&dyn PasswordConnector> {
        None
    }

    /// Non-interactive identity refresh, if supported.
    fn as_refresh(&self) -> Option<&dyn RefreshConnector> {
        None
    }
}

/// A connector that logs users in by redirecting them to an upstream
/// provider and consuming the resulting callback.
#[async_trait]
pub trait CallbackConnector: Send + Sync {
    /// Returns the URL to redirect the user to. `state` round-trips through
    /// the upstream provider and identifies the login on the way back.
    fn login_url(&self, scopes: &Scopes, callback_url: &str, state: &str)
    -> ConnectorResult<String>;

    /// Consumes the callback request and produces the authenticated
    /// identity.
    async fn handle_callback(
        &self,
        scopes: &Scopes,
        callback: CallbackData,
    ) -> ConnectorResult<Identity>;
}

/// A connector that validates a username and password directly.
#[async_trait]
pub trait PasswordConnector: Send + Sync {
    /// Checks the credentials. `Ok(None)` means the credentials were wrong
    /// and the user should be re-prompted; it is not an error.
    async fn login(
        &self,
        scopes: &Scopes,
        username: &str,
        password: &str,
    ) -> ConnectorResult<Option<Identity>>;
}

/// A connector that can refresh a previously recorded identity without user
/// interaction, invoked on refresh-token exchanges.
#[async_trait]
pub trait RefreshConnector: Send + Sync {
    /// Refreshes the identity. Receives the claims and connector data
    /// recorded on the grant.
    async fn refresh(&self, scopes: &Scopes, identity: Identity) -> ConnectorResult<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_from_scope_list() {
        let scopes =
            Scopes::from_scope_list(&["openid", "email", "offline_access", "unrecognized"]);
        assert!(scopes.offline_access);
        assert!(!scopes.groups);

        let scopes = Scopes::from_scope_list(&["openid", "groups"]);
        assert!(scopes.groups);
        assert!(!scopes.offline_access);
    }

    #[test]
    fn callback_data_param() {
        let mut query = HashMap::new();
        query.insert("code".to_string(), "abc".to_string());
        let data = CallbackData { query };
        assert_eq!(data.param("code"), Some("abc"));
        assert_eq!(data.param("missing"), None);
    }
}
