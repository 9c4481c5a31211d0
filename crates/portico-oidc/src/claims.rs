//! ID-token claims construction.
//!
//! Turns the claims recorded on a grant plus the authorized scopes into the
//! JWT claim set. Cross-client audiences arrive pre-validated; the trust
//! check itself needs client records and lives with the orchestrator.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use portico_model::Claims;

use crate::scopes::{SCOPE_EMAIL, SCOPE_GROUPS, SCOPE_PROFILE};

/// The `aud` claim: a bare string when there is exactly one audience, an
/// array otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience, serialized as a bare string.
    Single(String),
    /// Multiple audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether the audience contains the given client.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::Single(s) => s == client_id,
            Self::Multiple(v) => v.iter().any(|s| s == client_id),
        }
    }
}

impl From<Vec<String>> for Audience {
    fn from(mut v: Vec<String>) -> Self {
        if v.len() == 1 {
            Self::Single(v.remove(0))
        } else {
            Self::Multiple(v)
        }
    }
}

/// Claims of an issued ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject: stable per (connector, user), see [`encode_subject`].
    pub sub: String,

    /// Audience.
    pub aud: Audience,

    /// Expiration time (Unix seconds).
    pub exp: i64,

    /// Issued-at time (Unix seconds).
    pub iat: i64,

    /// Authorized party. Present only when the audience differs from the
    /// requesting client (cross-client tokens).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Replay nonce, echoed from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Email, when the `email` scope was authorized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Email verification flag, paired with `email`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Groups, when the `groups` scope was authorized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    /// Display name, when the `profile` scope was authorized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Builds the claim set for an ID token.
///
/// `peer_audiences` are the peer client IDs authorized through cross-client
/// scopes, already trust-checked. With no peers the audience is the
/// requesting client and `azp` is omitted; with peers the audience is the
/// peer list and `azp` names the requesting client.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn id_token_claims(
    issuer: &str,
    client_id: &str,
    connector_id: &str,
    claims: &Claims,
    scopes: &[String],
    nonce: &str,
    peer_audiences: Vec<String>,
    issued_at: DateTime<Utc>,
    expiry: DateTime<Utc>,
) -> IdTokenClaims {
    let mut token = IdTokenClaims {
        iss: issuer.to_string(),
        sub: encode_subject(connector_id, &claims.user_id),
        aud: Audience::Single(client_id.to_string()),
        exp: expiry.timestamp(),
        iat: issued_at.timestamp(),
        azp: None,
        nonce: (!nonce.is_empty()).then(|| nonce.to_string()),
        email: None,
        email_verified: None,
        groups: None,
        name: None,
    };

    for scope in scopes {
        match scope.as_str() {
            SCOPE_EMAIL => {
                token.email = Some(claims.email.clone());
                token.email_verified = Some(claims.email_verified);
            }
            SCOPE_GROUPS => token.groups = Some(claims.groups.clone()),
            SCOPE_PROFILE => token.name = Some(claims.username.clone()),
            _ => {}
        }
    }

    if !peer_audiences.is_empty() {
        token.aud = Audience::from(peer_audiences);
        token.azp = Some(client_id.to_string());
    }

    token
}

/// The decoded subject identifier.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Connector-scoped user ID.
    pub user_id: String,

    /// Connector that authenticated the user.
    pub conn_id: String,
}

/// Encodes a (connector, user) pair into the `sub` claim.
///
/// Subjects must be stable per connector and user, and opaque to clients.
#[must_use]
pub fn encode_subject(connector_id: &str, user_id: &str) -> String {
    let subject = Subject {
        user_id: user_id.to_string(),
        conn_id: connector_id.to_string(),
    };
    // Claims only hold strings, so serialization cannot fail.
    let json = serde_json::to_vec(&subject).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decodes a `sub` claim back into its parts.
#[must_use]
pub fn decode_subject(sub: &str) -> Option<Subject> {
    let bytes = URL_SAFE_NO_PAD.decode(sub).ok()?;
    serde_json::from_slice(&bytes).ok()
}
