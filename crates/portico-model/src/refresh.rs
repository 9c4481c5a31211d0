//! Refresh tokens.

use serde::{Deserialize, Serialize};

use crate::claims::Claims;

/// A refresh token, issued when the originating grant carried the
/// `offline_access` scope.
///
/// Claimed exactly once per use: every successful refresh deletes the row
/// and creates a replacement under a fresh identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Opaque identifier; this is the `refresh_token` value.
    pub id: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Connector that authenticated the user, consulted for identity
    /// refresh when it supports it.
    pub connector_id: String,

    /// Originally authorized scopes; refreshes may narrow but never widen.
    pub scopes: Vec<String>,

    /// Nonce from the originating request.
    pub nonce: String,

    /// Identity claims, updated on refresh when the connector supports it.
    pub claims: Claims,

    /// Opaque connector payload.
    #[serde(default)]
    pub connector_data: Vec<u8>,
}
