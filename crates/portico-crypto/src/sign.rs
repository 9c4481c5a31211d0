//! Compact JWS signing and verification.
//!
//! The signer produces `header.payload.signature` tokens (RFC 7515) under the
//! provider's current RSA key. Verification takes a public JWK, so any key in
//! the published JWKS — current or retained — can validate a token.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::jwk::{ALG_RS256, JsonWebKey};
use crate::keys::Signer;

/// JOSE header of an issued token.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    kid: String,
}

/// Signs a raw JSON payload, producing a compact JWS.
///
/// # Errors
///
/// Returns an error if the signature cannot be produced.
pub fn sign_payload(signer: &Signer, payload: &[u8]) -> CryptoResult<String> {
    let header = Header {
        alg: ALG_RS256.to_string(),
        kid: signer.kid().to_string(),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| CryptoError::Signing(format!("serialize JOSE header: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = signer.sign(signing_input.as_bytes())?;

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verifies a compact JWS against a public JWK and returns the payload.
///
/// # Errors
///
/// Returns an error if the token is malformed, the key IDs disagree, or the
/// signature does not verify.
pub fn verify_jws(token: &str, key: &JsonWebKey) -> CryptoResult<Vec<u8>> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CryptoError::Verification(
            "token is not a three-part compact JWS".to_string(),
        ));
    };

    let header: Header = serde_json::from_slice(&decode_part(header_b64)?)
        .map_err(|e| CryptoError::Verification(format!("malformed JOSE header: {e}")))?;
    if header.alg != ALG_RS256 {
        return Err(CryptoError::Verification(format!(
            "unexpected algorithm {:?}",
            header.alg
        )));
    }
    if header.kid != key.kid {
        return Err(CryptoError::Verification(format!(
            "token kid {:?} does not match key {:?}",
            header.kid, key.kid
        )));
    }

    let signature = decode_part(sig_b64)?;
    let signing_input = format!("{header_b64}.{payload_b64}");

    let public_der = rsa_public_key_der(
        &key.modulus()
            .map_err(|e| CryptoError::Verification(format!("malformed modulus: {e}")))?,
        &key.exponent()
            .map_err(|e| CryptoError::Verification(format!("malformed exponent: {e}")))?,
    );
    aws_lc_rs::signature::UnparsedPublicKey::new(
        &aws_lc_rs::signature::RSA_PKCS1_2048_8192_SHA256,
        &public_der,
    )
    .verify(signing_input.as_bytes(), &signature)
    .map_err(|_| CryptoError::Verification("signature mismatch".to_string()))?;

    decode_part(payload_b64)
}

fn decode_part(part: &str) -> CryptoResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| CryptoError::Verification(format!("invalid base64url segment: {e}")))
}

/// Encodes an `RSAPublicKey ::= SEQUENCE { modulus, publicExponent }`.
fn rsa_public_key_der(modulus: &[u8], exponent: &[u8]) -> Vec<u8> {
    let n = der_integer(modulus);
    let e = der_integer(exponent);
    let mut body = Vec::with_capacity(n.len() + e.len());
    body.extend_from_slice(&n);
    body.extend_from_slice(&e);

    let mut out = vec![0x30];
    push_der_length(&mut out, body.len());
    out.extend_from_slice(&body);
    out
}

/// Encodes a positive ASN.1 INTEGER, padding with a zero byte when the high
/// bit is set.
fn der_integer(value: &[u8]) -> Vec<u8> {
    let pad = value.first().is_some_and(|b| b & 0x80 != 0);
    let len = value.len() + usize::from(pad);

    let mut out = vec![0x02];
    push_der_length(&mut out, len);
    if pad {
        out.push(0);
    }
    out.extend_from_slice(value);
    out
}

fn push_der_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;

    fn signer() -> Signer {
        Signer::from_key(&SigningKey::generate().unwrap()).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let signer = signer();
        let payload = br#"{"iss":"https://idp.example.com","sub":"abc"}"#;

        let token = sign_payload(&signer, payload).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let jwk = signer.public_jwk().unwrap();
        let verified = verify_jws(&token, &jwk).unwrap();
        assert_eq!(verified, payload);
    }

    #[test]
    fn tampered_payload_fails() {
        let signer = signer();
        let token = sign_payload(&signer, b"{\"sub\":\"alice\"}").unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(b"{\"sub\":\"mallory\"}");
        parts[1] = &forged;
        let forged_token = parts.join(".");

        let jwk = signer.public_jwk().unwrap();
        assert!(verify_jws(&forged_token, &jwk).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let signer = signer();
        let other = self::signer();
        let token = sign_payload(&signer, b"payload").unwrap();

        let jwk = other.public_jwk().unwrap();
        assert!(verify_jws(&token, &jwk).is_err());
    }

    #[test]
    fn header_declares_rs256_and_kid() {
        let signer = signer();
        let token = sign_payload(&signer, b"{}").unwrap();

        let header_b64 = token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], signer.kid());
    }

    #[test]
    fn der_length_encoding() {
        let mut short = Vec::new();
        push_der_length(&mut short, 0x7f);
        assert_eq!(short, vec![0x7f]);

        let mut long = Vec::new();
        push_der_length(&mut long, 0x0101);
        assert_eq!(long, vec![0x82, 0x01, 0x01]);
    }
}
