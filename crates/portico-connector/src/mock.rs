//! Mock connectors for wiring tests.
//!
//! `CallbackMock` "authenticates" anyone who completes the redirect round
//! trip; `PasswordMock` accepts a single fixed credential pair. Neither
//! talks to a real backend.

use async_trait::async_trait;

use crate::{
    CallbackConnector, CallbackData, Connector, ConnectorError, ConnectorResult, Identity,
    PasswordConnector, RefreshConnector, Scopes,
};

/// A callback connector that immediately redirects back and returns a
/// canned identity.
pub struct CallbackMock {
    identity: Identity,
}

impl CallbackMock {
    /// Creates a mock returning the given identity.
    #[must_use]
    pub const fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// Creates a mock returning a default test identity.
    #[must_use]
    pub fn with_test_identity() -> Self {
        Self::new(Identity {
            user_id: "0-385-28089-0".to_string(),
            username: "Kilgore Trout".to_string(),
            email: "kilgore@kilgore.trout".to_string(),
            email_verified: true,
            groups: vec!["authors".to_string()],
            connector_data: b"foobar".to_vec(),
        })
    }
}

impl Connector for CallbackMock {
    fn as_callback(&self) -> Option<&dyn CallbackConnector> {
        Some(self)
    }

    fn as_refresh(&self) -> Option<&dyn RefreshConnector> {
        Some(self)
    }
}

#[async_trait]
impl CallbackConnector for CallbackMock {
    fn login_url(
        &self,
        _scopes: &Scopes,
        callback_url: &str,
        state: &str,
    ) -> ConnectorResult<String> {
        Ok(format!(
            "{callback_url}?state={}",
            urlencode_component(state)
        ))
    }

    async fn handle_callback(
        &self,
        _scopes: &Scopes,
        _callback: CallbackData,
    ) -> ConnectorResult<Identity> {
        Ok(self.identity.clone())
    }
}

#[async_trait]
impl RefreshConnector for CallbackMock {
    async fn refresh(&self, _scopes: &Scopes, _identity: Identity) -> ConnectorResult<Identity> {
        Ok(self.identity.clone())
    }
}

/// A password connector accepting exactly one username/password pair.
pub struct PasswordMock {
    username: String,
    password: String,
    identity: Identity,
}

impl PasswordMock {
    /// Creates a mock accepting the given credentials.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        identity: Identity,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            identity,
        }
    }
}

impl Connector for PasswordMock {
    fn as_password(&self) -> Option<&dyn PasswordConnector> {
        Some(self)
    }
}

#[async_trait]
impl PasswordConnector for PasswordMock {
    async fn login(
        &self,
        _scopes: &Scopes,
        username: &str,
        password: &str,
    ) -> ConnectorResult<Option<Identity>> {
        if username.is_empty() {
            return Err(ConnectorError::Upstream(
                "empty username rejected by backend".to_string(),
            ));
        }
        if username == self.username && password == self.password {
            Ok(Some(self.identity.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Minimal percent-encoding for the state value embedded in the mock's
/// callback URL.
fn urlencode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
