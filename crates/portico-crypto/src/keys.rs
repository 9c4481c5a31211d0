//! RSA signing key management.
//!
//! The storage layer holds the provider's current signing key as PKCS#8 DER
//! bytes ([`SigningKey`]); this module loads it into an aws-lc-rs key pair
//! ([`Signer`]) for RS256 signing and derives the public JWK published by the
//! JWKS endpoint.

use aws_lc_rs::{
    encoding::{AsDer, Pkcs8V1Der},
    rand::SystemRandom,
    rsa::KeySize,
    signature::{self, KeyPair, RsaKeyPair},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::jwk::JsonWebKey;

/// A persisted RSA signing key.
///
/// This is the private half of the key pair, stored by the keys singleton in
/// storage. The bytes are PKCS#8 v1 DER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key ID, matching the `kid` of the derived public JWK.
    pub kid: String,

    /// PKCS#8 DER-encoded RSA private key.
    pub der: Vec<u8>,
}

impl SigningKey {
    /// Generates a fresh 2048-bit RSA signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or serialization fails.
    pub fn generate() -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::generate(KeySize::Rsa2048)
            .map_err(|e| CryptoError::KeyGeneration(format!("generate RSA key: {e}")))?;
        let der: Pkcs8V1Der = key_pair
            .as_der()
            .map_err(|e| CryptoError::KeyGeneration(format!("serialize RSA key: {e}")))?;
        let kid = key_id(key_pair.public_key().as_ref());
        Ok(Self {
            kid,
            der: der.as_ref().to_vec(),
        })
    }
}

/// An RS256 signer loaded from a [`SigningKey`].
pub struct Signer {
    key_pair: RsaKeyPair,
    kid: String,
}

impl Signer {
    /// Loads a signer from a persisted key.
    ///
    /// # Errors
    ///
    /// Returns an error if the DER bytes do not parse as an RSA private key.
    pub fn from_key(key: &SigningKey) -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::from_pkcs8(&key.der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid PKCS#8 RSA key: {e}")))?;
        Ok(Self {
            key_pair,
            kid: key.kid.clone(),
        })
    }

    /// Returns the key ID.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signs data with RSA PKCS#1 v1.5 / SHA-256.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let rng = SystemRandom::new();
        let mut sig = vec![0u8; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(&signature::RSA_PKCS1_SHA256, &rng, data, &mut sig)
            .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
        Ok(sig)
    }

    /// Returns the public half as a JWK.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be decomposed.
    pub fn public_jwk(&self) -> CryptoResult<JsonWebKey> {
        let spki = self.key_pair.public_key().as_ref();
        let (n, e) = rsa_components(spki)?;
        Ok(JsonWebKey::rsa_signing(&self.kid, &n, &e))
    }
}

/// Derives a key ID from the public key bytes.
fn key_id(public_key: &[u8]) -> String {
    let digest = aws_lc_rs::digest::digest(&aws_lc_rs::digest::SHA256, public_key);
    URL_SAFE_NO_PAD.encode(&digest.as_ref()[..8])
}

/// Extracts the RSA modulus and exponent from a `SubjectPublicKeyInfo`.
///
/// The structure is:
///
/// ```text
/// SEQUENCE {
///   SEQUENCE { OID, NULL }
///   BIT STRING (containing RSAPublicKey)
/// }
/// RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }
/// ```
pub(crate) fn rsa_components(spki: &[u8]) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
    let mut pos = 0;

    // Outer SEQUENCE.
    expect_tag(spki, pos, 0x30)?;
    pos += 1;
    pos = skip_length(spki, pos)?;

    // Algorithm SEQUENCE.
    expect_tag(spki, pos, 0x30)?;
    pos += 1;
    let alg_len = read_length(spki, pos)?;
    pos = skip_length(spki, pos)?;
    pos += alg_len;

    // BIT STRING holding the key, preceded by an unused-bits byte.
    expect_tag(spki, pos, 0x03)?;
    pos += 1;
    pos = skip_length(spki, pos)?;
    pos += 1;

    // RSAPublicKey SEQUENCE.
    expect_tag(spki, pos, 0x30)?;
    pos += 1;
    pos = skip_length(spki, pos)?;

    let (n, next) = read_integer(spki, pos)?;
    let (e, _) = read_integer(spki, next)?;
    Ok((n, e))
}

fn expect_tag(data: &[u8], pos: usize, tag: u8) -> CryptoResult<()> {
    if data.get(pos) == Some(&tag) {
        Ok(())
    } else {
        Err(CryptoError::InvalidKey(format!(
            "malformed SPKI: expected tag {tag:#04x} at offset {pos}"
        )))
    }
}

/// Reads an ASN.1 INTEGER at `pos`, stripping the sign padding byte.
fn read_integer(data: &[u8], pos: usize) -> CryptoResult<(Vec<u8>, usize)> {
    expect_tag(data, pos, 0x02)?;
    let len = read_length(data, pos + 1)?;
    let start = skip_length(data, pos + 1)?;
    let end = start + len;
    if end > data.len() {
        return Err(CryptoError::InvalidKey(
            "malformed SPKI: truncated INTEGER".to_string(),
        ));
    }
    let mut value = data[start..end].to_vec();
    if value.first() == Some(&0) {
        value.remove(0);
    }
    Ok((value, end))
}

/// Reads an ASN.1 length field and returns its value.
fn read_length(data: &[u8], pos: usize) -> CryptoResult<usize> {
    let first = *data
        .get(pos)
        .ok_or_else(|| CryptoError::InvalidKey("malformed SPKI: truncated length".to_string()))?;
    if first < 0x80 {
        return Ok(first as usize);
    }
    let num_bytes = (first & 0x7f) as usize;
    if num_bytes > 4 {
        return Err(CryptoError::InvalidKey(
            "malformed SPKI: length too large".to_string(),
        ));
    }
    let mut len = 0usize;
    for i in 0..num_bytes {
        let byte = *data.get(pos + 1 + i).ok_or_else(|| {
            CryptoError::InvalidKey("malformed SPKI: truncated length".to_string())
        })?;
        len = (len << 8) | (byte as usize);
    }
    Ok(len)
}

/// Skips an ASN.1 length field and returns the position after it.
fn skip_length(data: &[u8], pos: usize) -> CryptoResult<usize> {
    let first = *data
        .get(pos)
        .ok_or_else(|| CryptoError::InvalidKey("malformed SPKI: truncated length".to_string()))?;
    if first < 0x80 {
        Ok(pos + 1)
    } else {
        Ok(pos + 1 + (first & 0x7f) as usize)
    }
}
