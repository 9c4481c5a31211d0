//! OAuth 2.0 protocol errors.
//!
//! Error codes as defined by RFC 6749 §4.1.2.1 and §5.2. How an error is
//! delivered depends on where the flow is: HTML before the redirect target
//! is validated, a redirect afterwards, JSON on the token endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth 2.0 protocol errors.
#[derive(Debug, Error)]
pub enum OauthError {
    /// Malformed or missing request parameters.
    #[error("{0}")]
    InvalidRequest(String),

    /// Client authentication failed at the token endpoint.
    #[error("{0}")]
    InvalidClient(String),

    /// Stale, reused, or mismatched code or refresh token.
    #[error("{0}")]
    InvalidGrant(String),

    /// Unknown client on the authorization endpoint.
    #[error("{0}")]
    UnauthorizedClient(String),

    /// Unrecognized or untrusted scope.
    #[error("{0}")]
    InvalidScope(String),

    /// The server does not offer the requested response type.
    #[error("{0}")]
    UnsupportedResponseType(String),

    /// The resource owner rejected the request.
    #[error("{0}")]
    AccessDenied(String),

    /// Storage, signing, or connector failure. The cause is logged; the
    /// message here is what the client sees.
    #[error("{0}")]
    ServerError(String),
}

impl OauthError {
    /// Returns the RFC 6749 error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::AccessDenied(_) => "access_denied",
            Self::ServerError(_) => "server_error",
        }
    }

    /// Returns the HTTP status for a JSON (token endpoint) rendering.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::UnauthorizedClient(_)
            | Self::InvalidScope(_)
            | Self::UnsupportedResponseType(_)
            | Self::AccessDenied(_) => 400,
            Self::InvalidClient(_) => 401,
            Self::ServerError(_) => 500,
        }
    }

    /// A server error with the generic client-facing message.
    #[must_use]
    pub fn server_error() -> Self {
        Self::ServerError(String::new())
    }

    /// Renders the JSON error body.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        let description = self.to_string();
        ErrorResponse {
            error: self.error_code().to_string(),
            error_description: (!description.is_empty()).then_some(description),
        }
    }
}

/// JSON error body returned by the token endpoint, RFC 6749 §5.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Result type for protocol operations.
pub type OauthResult<T> = Result<T, OauthError>;
