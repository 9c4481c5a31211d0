//! Token endpoint types.

use serde::{Deserialize, Serialize};

/// `grant_type` value for the code exchange, RFC 6749 §4.1.3.
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// `grant_type` value for refresh, RFC 6749 §6.
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

/// The raw `/token` form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenForm {
    /// Requested grant type.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code, for the code exchange.
    #[serde(default)]
    pub code: String,

    /// Redirect URI, must match the one recorded at authorization.
    #[serde(default)]
    pub redirect_uri: String,

    /// Refresh token, for the refresh exchange.
    #[serde(default)]
    pub refresh_token: String,

    /// Optional narrowed scopes on refresh.
    #[serde(default)]
    pub scope: String,

    /// Client ID, when not using Basic auth.
    #[serde(default)]
    pub client_id: String,

    /// Client secret, when not using Basic auth.
    #[serde(default)]
    pub client_secret: String,
}

/// Successful token endpoint response, RFC 6749 §5.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque access token. Nothing should depend on its structure.
    pub access_token: String,

    /// Always `"bearer"`.
    pub token_type: String,

    /// Seconds until the ID token expires.
    pub expires_in: i64,

    /// Rotated refresh token, present iff the grant carries
    /// `offline_access`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Compact JWS ID token.
    pub id_token: String,
}
