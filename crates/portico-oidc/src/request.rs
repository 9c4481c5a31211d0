//! Authorization request parsing and validation.
//!
//! The form type and the storage-free validation steps live here; the flow
//! orchestrator interleaves them with client lookups and cross-client trust
//! checks, in the order RFC 6749 demands (nothing may be redirected to the
//! `redirect_uri` before it has been validated against the client).

use serde::Deserialize;

use portico_model::client::REDIRECT_URI_OOB;

use crate::error::{OauthError, OauthResult};
use crate::scopes::{KNOWN_SCOPES, parse_cross_client_scope};

/// Response type for the authorization-code flow.
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Response type for the implicit flow (tokens in the URL fragment).
pub const RESPONSE_TYPE_TOKEN: &str = "token";

/// Response type placing the ID token in the URL fragment.
pub const RESPONSE_TYPE_ID_TOKEN: &str = "id_token";

/// The raw `/auth` form, query- or body-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationForm {
    /// OAuth `client_id`.
    #[serde(default)]
    pub client_id: String,

    /// Requested redirect URI.
    #[serde(default)]
    pub redirect_uri: String,

    /// Space-separated response types.
    #[serde(default)]
    pub response_type: String,

    /// Space-separated scopes.
    #[serde(default)]
    pub scope: String,

    /// CSRF state, echoed back to the client.
    #[serde(default)]
    pub state: String,

    /// Replay nonce, carried into the ID token.
    #[serde(default)]
    pub nonce: String,

    /// `force` requests the consent page even when approval is normally
    /// skipped.
    #[serde(default)]
    pub approval_prompt: String,
}

impl AuthorizationForm {
    /// Splits the scope field into individual scopes.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(String::from).collect()
    }

    /// Splits the response type field into individual types.
    #[must_use]
    pub fn response_types(&self) -> Vec<String> {
        self.response_type
            .split_whitespace()
            .map(String::from)
            .collect()
    }
}

/// Outcome of classifying a scope list, before trust checks.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScopeClassification {
    /// The mandatory `openid` scope was present.
    pub has_openid: bool,

    /// Scopes the provider does not recognize at all.
    pub unrecognized: Vec<String>,

    /// Peer client IDs named by cross-client scopes. Each still needs a
    /// trust check against the requesting client.
    pub cross_client_peers: Vec<String>,
}

/// Classifies scopes into known, unrecognized, and cross-client.
#[must_use]
pub fn classify_scopes(scopes: &[String]) -> ScopeClassification {
    let mut out = ScopeClassification::default();
    for scope in scopes {
        if scope == "openid" {
            out.has_openid = true;
        } else if KNOWN_SCOPES.contains(&scope.as_str()) {
            // Plain recognized scope, nothing to record.
        } else if let Some(peer) = parse_cross_client_scope(scope) {
            out.cross_client_peers.push(peer.to_string());
        } else {
            out.unrecognized.push(scope.clone());
        }
    }
    out
}

/// Validates the requested response types against what the server offers.
///
/// # Errors
///
/// - a type the server does not declare → `unsupported_response_type`
/// - `token` without a nonce, or combined with the OOB redirect →
///   `invalid_request`
pub fn validate_response_types(
    response_types: &[String],
    supported: &[String],
    nonce: &str,
    redirect_uri: &str,
) -> OauthResult<()> {
    if response_types.is_empty() {
        return Err(OauthError::UnsupportedResponseType(
            "no response_type provided".to_string(),
        ));
    }
    for response_type in response_types {
        if !supported.iter().any(|s| s == response_type) {
            return Err(OauthError::UnsupportedResponseType(format!(
                "unsupported response type {response_type:?}"
            )));
        }
        if response_type == RESPONSE_TYPE_TOKEN {
            // https://openid.net/specs/openid-connect-core-1_0.html#ImplicitAuthRequest
            if nonce.is_empty() {
                return Err(OauthError::InvalidRequest(
                    "response type 'token' requires a 'nonce' value".to_string(),
                ));
            }
            if redirect_uri == REDIRECT_URI_OOB {
                return Err(OauthError::InvalidRequest(format!(
                    "cannot use response type 'token' with redirect_uri {REDIRECT_URI_OOB:?}"
                )));
            }
        }
    }
    Ok(())
}
