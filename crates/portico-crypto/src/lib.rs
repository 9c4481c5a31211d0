//! # portico-crypto
//!
//! Cryptographic building blocks for the Portico identity provider:
//!
//! - JSON Web Key types published by the JWKS endpoint
//! - RS256 compact JWS signing under a stored RSA key
//! - Opaque, URL-safe identifiers for grants, codes, and tokens

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod jwk;
pub mod keys;
pub mod random;
pub mod sign;

pub use error::CryptoError;
pub use jwk::{JsonWebKey, JsonWebKeySet};
pub use keys::{Signer, SigningKey};
pub use random::new_id;
