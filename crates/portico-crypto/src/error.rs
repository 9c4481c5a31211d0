//! Crypto error types.

use thiserror::Error;

/// Errors from key handling, signing, and verification.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A key could not be parsed or failed validation.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Producing a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A signature did not verify or a token was malformed.
    #[error("verification failed: {0}")]
    Verification(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
