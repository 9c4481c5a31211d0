//! Endpoint handlers.
//!
//! Error delivery follows RFC 6749: before the redirect target is
//! validated, errors render as HTML ([`crate::pages::error_page`]); after,
//! they redirect back to the client (§4.1.2.1, [`redirect_error`]); on the
//! token endpoint they are JSON (§5.2, [`token_error`]).

pub mod authorization;
pub mod discovery;
pub mod health;
pub mod token;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use portico_oidc::error::OauthError;

/// Redirects an error back to the client, appending `state`, `error`, and
/// `error_description` to the existing query string.
pub(crate) fn redirect_error(redirect_uri: &str, state: &str, err: &OauthError) -> Response {
    let mut params = vec![("state", state.to_string()), ("error", err.error_code().to_string())];
    let description = err.to_string();
    if !description.is_empty() {
        params.push(("error_description", description));
    }
    // Parameters only hold strings, so encoding cannot fail.
    let encoded = serde_urlencoded::to_string(&params).unwrap_or_default();

    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{redirect_uri}{separator}{encoded}")).into_response()
}

/// Renders a token-endpoint error as JSON with the matching status code.
pub(crate) fn token_error(err: &OauthError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_response())).into_response()
}
