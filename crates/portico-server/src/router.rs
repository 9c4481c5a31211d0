//! Router configuration.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::endpoints::{authorization, discovery, health, token};
use crate::state::AppState;

/// Creates the application router.
///
/// | Method   | Path                                | Handler |
/// |----------|-------------------------------------|---------|
/// | GET      | `/healthz`                          | storage round trip |
/// | GET      | `/.well-known/openid-configuration` | discovery document |
/// | GET      | `/keys`                             | JWKS |
/// | GET/POST | `/auth`                             | create auth request |
/// | GET/POST | `/auth/{connector}`                 | connector login |
/// | GET      | `/callback`                         | connector callback |
/// | GET/POST | `/approval`                         | consent and code issuance |
/// | POST     | `/token`                            | token exchange |
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health))
        .route(
            "/.well-known/openid-configuration",
            get(discovery::discovery),
        )
        .route("/keys", get(discovery::keys))
        .route(
            "/auth",
            get(authorization::authorize_get).post(authorization::authorize_post),
        )
        .route(
            "/auth/{connector}",
            get(authorization::connector_login_get).post(authorization::connector_login_post),
        )
        .route("/callback", get(authorization::callback))
        .route(
            "/approval",
            get(authorization::approval_get).post(authorization::approval_post),
        )
        .route("/token", post(token::token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
