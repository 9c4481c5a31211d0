//! The signing-key singleton.

use chrono::{DateTime, Utc};
use portico_crypto::{JsonWebKey, SigningKey};
use serde::{Deserialize, Serialize};

/// The provider's key material.
///
/// Exactly one row exists, enforced by the storage contract through a fixed
/// well-known name. The core reads this to sign tokens and publish JWKS;
/// rotation policy lives outside the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Current signing key (private half). `None` until bootstrap installs
    /// one.
    pub signing_key: Option<SigningKey>,

    /// Public half of the signing key, published first in the JWKS.
    pub signing_key_pub: Option<JsonWebKey>,

    /// Prior public keys retained so outstanding tokens keep verifying.
    pub verification_keys: Vec<VerificationKey>,

    /// When the next rotation is due; drives the JWKS `Cache-Control`
    /// max-age.
    pub next_rotation: DateTime<Utc>,
}

/// A retired public key kept for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    /// The retired public key.
    pub public_key: JsonWebKey,

    /// When the key can be dropped from the set.
    pub expiry: DateTime<Utc>,
}
