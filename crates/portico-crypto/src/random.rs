//! Opaque identifier generation.
//!
//! Every persisted entity (auth requests, codes, refresh tokens) and every
//! access token is addressed by an identifier produced here. Identifiers are
//! URL-safe and carry 128 bits of entropy, which also makes them suitable as
//! single-use credentials (auth codes are bearer secrets until redeemed).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;

/// Number of random bytes in an opaque identifier.
const ID_BYTES: usize = 16;

/// Generates cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a new opaque entity identifier.
///
/// 16 random bytes encoded as unpadded base64url: 22 characters, 128 bits of
/// entropy, safe to embed in URLs without escaping.
#[must_use]
pub fn new_id() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(ID_BYTES))
}
