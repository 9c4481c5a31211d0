//! OpenID Connect discovery document.
//!
//! Built once at startup from the issuer URL and the configured response
//! types, then served as static JSON from
//! `/.well-known/openid-configuration`.

use serde::{Deserialize, Serialize};

/// The provider metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    /// Issuer identifier; also the base for the endpoint URLs.
    pub issuer: String,

    /// URL of the authorization endpoint.
    pub authorization_endpoint: String,

    /// URL of the token endpoint.
    pub token_endpoint: String,

    /// URL of the JWKS document.
    pub jwks_uri: String,

    /// Offered response types, sorted.
    pub response_types_supported: Vec<String>,

    /// Always `["public"]`.
    pub subject_types_supported: Vec<String>,

    /// Always `["RS256"]`.
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// Recognized scopes.
    pub scopes_supported: Vec<String>,

    /// Always `["client_secret_basic"]`.
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Claims an ID token may carry.
    pub claims_supported: Vec<String>,
}

impl Discovery {
    /// Builds the document for an issuer.
    ///
    /// `issuer` must not have a trailing slash; endpoint URLs are derived by
    /// appending the well-known paths.
    #[must_use]
    pub fn new(issuer: &str, supported_response_types: &[String]) -> Self {
        let mut response_types = supported_response_types.to_vec();
        response_types.sort();

        let strings = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();

        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/auth"),
            token_endpoint: format!("{issuer}/token"),
            jwks_uri: format!("{issuer}/keys"),
            response_types_supported: response_types,
            subject_types_supported: strings(&["public"]),
            id_token_signing_alg_values_supported: strings(&["RS256"]),
            scopes_supported: strings(&["openid", "email", "groups", "profile", "offline_access"]),
            token_endpoint_auth_methods_supported: strings(&["client_secret_basic"]),
            claims_supported: strings(&[
                "aud",
                "email",
                "email_verified",
                "exp",
                "groups",
                "iat",
                "iss",
                "name",
                "sub",
            ]),
        }
    }
}
