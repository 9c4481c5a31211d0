//! JSON Web Key types.
//!
//! Implements the subset of [RFC 7517](https://tools.ietf.org/html/rfc7517)
//! the provider needs: RSA public signing keys and the key set served by the
//! JWKS endpoint. Portico signs ID tokens with RS256 only, so no other key
//! types are modelled.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// JWA name of the only signature algorithm the provider issues.
pub const ALG_RS256: &str = "RS256";

/// An RSA public key in JWK format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type. Always `"RSA"`.
    pub kty: String,

    /// Public key use. Always `"sig"`.
    #[serde(rename = "use")]
    pub key_use: String,

    /// Algorithm intended for use with the key.
    pub alg: String,

    /// Key ID, derived from a digest of the public key.
    pub kid: String,

    /// RSA modulus, base64url without padding.
    pub n: String,

    /// RSA public exponent, base64url without padding.
    pub e: String,
}

impl JsonWebKey {
    /// Builds an RSA signing JWK from raw modulus and exponent bytes.
    #[must_use]
    pub fn rsa_signing(kid: impl Into<String>, modulus: &[u8], exponent: &[u8]) -> Self {
        Self {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: ALG_RS256.to_string(),
            kid: kid.into(),
            n: URL_SAFE_NO_PAD.encode(modulus),
            e: URL_SAFE_NO_PAD.encode(exponent),
        }
    }

    /// Decodes the modulus bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not valid base64url.
    pub fn modulus(&self) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(&self.n)
    }

    /// Decodes the public exponent bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not valid base64url.
    pub fn exponent(&self) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(&self.e)
    }
}

/// JSON Web Key Set, as served by the `/keys` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// The published keys. The current signing key comes first, followed by
    /// retained verification keys.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Finds a key by its ID.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}
