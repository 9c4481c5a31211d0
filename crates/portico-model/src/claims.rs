//! User claims recorded on a grant after authentication.

use serde::{Deserialize, Serialize};

/// Claims copied from a connector identity onto a grant.
///
/// Stored on auth requests once the user logs in, and carried through auth
/// codes and refresh tokens into ID-token claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Upstream user identifier, unique within the connector.
    pub user_id: String,

    /// Display username.
    pub username: String,

    /// Email address.
    pub email: String,

    /// Whether the upstream backend verified the email.
    pub email_verified: bool,

    /// Group memberships.
    pub groups: Vec<String>,
}
