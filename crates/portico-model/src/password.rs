//! Local password records.

use serde::{Deserialize, Serialize};

/// A password-backed local user, consumed by the stored-password connector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    /// Login email. Lowercased on write and lookup; immutable once set.
    pub email: String,

    /// Opaque password hash (PHC string).
    pub hash: String,

    /// Display username.
    pub username: String,

    /// Stable user identifier.
    pub user_id: String,
}
