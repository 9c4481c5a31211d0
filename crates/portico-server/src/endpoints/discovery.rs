//! Discovery and JWKS handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::Duration;

use portico_crypto::JsonWebKeySet;

use crate::pages;
use crate::state::AppState;

/// GET `/.well-known/openid-configuration`
///
/// Serves the document marshalled at startup.
pub async fn discovery(State(state): State<AppState>) -> Response {
    (
        [(CONTENT_TYPE, "application/json")],
        state.discovery_json.as_str().to_owned(),
    )
        .into_response()
}

/// GET `/keys`
///
/// Publishes the current signing key followed by the retained verification
/// keys. `Cache-Control` advertises the time until the next rotation,
/// floored at two minutes.
pub async fn keys(State(state): State<AppState>) -> Response {
    let keys = match state.storage.get_keys().await {
        Ok(keys) => keys,
        Err(err) => {
            tracing::error!("failed to get keys: {err}");
            return internal_error();
        }
    };
    let Some(signing_key_pub) = keys.signing_key_pub else {
        tracing::error!("no public keys found");
        return internal_error();
    };

    let mut jwks = JsonWebKeySet {
        keys: Vec::with_capacity(keys.verification_keys.len() + 1),
    };
    jwks.keys.push(signing_key_pub);
    jwks.keys
        .extend(keys.verification_keys.into_iter().map(|k| k.public_key));

    let mut max_age = keys.next_rotation - state.now();
    if max_age < Duration::minutes(2) {
        max_age = Duration::minutes(2);
    }

    (
        [
            (CONTENT_TYPE, "application/json".to_string()),
            (
                CACHE_CONTROL,
                format!("max-age={}, must-revalidate", max_age.num_seconds()),
            ),
        ],
        axum::Json(jwks).into_response(),
    )
        .into_response()
}

fn internal_error() -> Response {
    pages::error_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "server_error",
        "Internal server error.",
    )
}
