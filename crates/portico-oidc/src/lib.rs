//! # portico-oidc
//!
//! Protocol-level pieces of the identity provider: the OAuth 2.0 error
//! surface, authorization-request parsing and validation, ID-token claims
//! construction, and the discovery document.
//!
//! Everything here is storage-free; the flow orchestrator supplies client
//! records and trust decisions.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod claims;
pub mod discovery;
pub mod error;
pub mod request;
pub mod scopes;
pub mod token;

pub use claims::{Audience, IdTokenClaims};
pub use error::{ErrorResponse, OauthError, OauthResult};
pub use token::TokenResponse;
