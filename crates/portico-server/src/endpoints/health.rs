//! Health handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Duration;

use portico_crypto::new_id;
use portico_model::AuthRequest;

use crate::pages;
use crate::state::AppState;

/// GET `/healthz`
///
/// Rather than introspecting health, exercise the storage: create and
/// delete a throwaway auth request. The short expiry means garbage
/// collection cleans up after a failed delete.
pub async fn health(State(state): State<AppState>) -> Response {
    let start = state.now();

    let probe = AuthRequest {
        id: new_id(),
        client_id: new_id(),
        expiry: start + Duration::minutes(1),
        ..AuthRequest::default()
    };
    let result = async {
        state.storage.create_auth_request(probe.clone()).await?;
        state.storage.delete_auth_request(&probe.id).await
    }
    .await;

    let elapsed = state.now() - start;
    match result {
        Ok(()) => (
            StatusCode::OK,
            format!("Health check passed in {}ms", elapsed.num_milliseconds()),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("storage health check failed: {err}");
            pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Health check failed.",
            )
        }
    }
}
