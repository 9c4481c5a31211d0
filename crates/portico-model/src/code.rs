//! Single-use authorization codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::Claims;

/// An authorization code awaiting exchange at the token endpoint.
///
/// Redeemable exactly once: deletion of the row is the commit point of
/// redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCode {
    /// Opaque identifier; this is the `code` value handed to the client.
    pub id: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Connector that authenticated the user.
    pub connector_id: String,

    /// Nonce from the originating request.
    pub nonce: String,

    /// Authorized scopes.
    pub scopes: Vec<String>,

    /// Identity claims recorded at login.
    pub claims: Claims,

    /// Opaque connector payload.
    #[serde(default)]
    pub connector_data: Vec<u8>,

    /// Redirect URI the code was issued for; the exchange must present the
    /// same value.
    pub redirect_uri: String,

    /// When the code expires.
    pub expiry: DateTime<Utc>,
}
