//! Scope vocabulary.

/// Mandatory scope on every authorization request.
pub const SCOPE_OPENID: &str = "openid";

/// Requests a refresh token.
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Requests the `email` and `email_verified` claims.
pub const SCOPE_EMAIL: &str = "email";

/// Requests the `name` claim.
pub const SCOPE_PROFILE: &str = "profile";

/// Requests the `groups` claim.
pub const SCOPE_GROUPS: &str = "groups";

/// Prefix of cross-client scopes: `audience:server:client_id:<peer_id>`
/// requests an ID token whose audience is the named peer client.
pub const SCOPE_CROSS_CLIENT_PREFIX: &str = "audience:server:client_id:";

/// All plain (non-cross-client) scopes the provider recognizes.
pub const KNOWN_SCOPES: [&str; 5] = [
    SCOPE_OPENID,
    SCOPE_OFFLINE_ACCESS,
    SCOPE_EMAIL,
    SCOPE_PROFILE,
    SCOPE_GROUPS,
];

/// Extracts the peer client ID from a cross-client scope, if it is one.
#[must_use]
pub fn parse_cross_client_scope(scope: &str) -> Option<&str> {
    scope.strip_prefix(SCOPE_CROSS_CLIENT_PREFIX)
}
