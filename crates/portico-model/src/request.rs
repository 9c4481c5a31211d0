//! In-flight authorization requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::Claims;

/// An authorization request, created at `/auth` and driven through connector
/// login, approval, and code issuance.
///
/// One row exists per in-flight login. All mutation goes through the storage
/// update-by-mutator contract; the row is deleted when a code is issued or
/// garbage-collected after `expiry`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Opaque identifier, also used as the `state` handed to callback
    /// connectors.
    pub id: String,

    /// Client that initiated the request.
    pub client_id: String,

    /// Requested response types, a subset of `code`, `token`, `id_token`.
    pub response_types: Vec<String>,

    /// Requested scopes. Always contains `openid`.
    pub scopes: Vec<String>,

    /// Redirect URI, validated against the client at creation.
    pub redirect_uri: String,

    /// Client-supplied CSRF state, echoed back on the redirect.
    pub state: String,

    /// Client-supplied replay nonce, carried into the ID token.
    pub nonce: String,

    /// The client asked for the consent page even when approval is
    /// normally skipped (`approval_prompt=force`).
    pub force_approval_prompt: bool,

    /// Set once a connector produced an identity.
    pub logged_in: bool,

    /// Identity claims, present after login.
    pub claims: Option<Claims>,

    /// Connector chosen for this login, set on `/auth/{connector}`.
    pub connector_id: Option<String>,

    /// Opaque connector payload, carried verbatim into codes and refresh
    /// tokens.
    #[serde(default)]
    pub connector_data: Vec<u8>,

    /// When the request expires and becomes garbage.
    pub expiry: DateTime<Utc>,
}
