//! Test fixtures: an app wired with in-memory storage and mock connectors,
//! plus helpers to drive the router without a listening socket.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, Request, StatusCode};
use base64::{Engine, engine::general_purpose::STANDARD};
use tower::ServiceExt;

use portico_connector::mock::CallbackMock;
use portico_model::Client;
use portico_server::{AppState, RegisteredConnector, ServerConfig, create_router, keys};
use portico_storage::{MemoryStorage, Storage};

pub const ISSUER: &str = "https://idp.example.com";

/// A router plus direct storage access for assertions.
pub struct TestEnv {
    pub app: Router,
    pub storage: Arc<dyn Storage>,
}

/// Builds a test environment. The mock callback connector is always
/// registered as `"mock"`; more connectors can be added through `extra`.
pub async fn test_env(
    configure: impl FnOnce(&mut ServerConfig),
    extra: impl FnOnce(&mut HashMap<String, RegisteredConnector>),
) -> TestEnv {
    let mut config = ServerConfig::for_testing(ISSUER);
    configure(&mut config);

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    keys::ensure_signing_keys(storage.as_ref()).await.unwrap();

    let mut connectors = HashMap::new();
    connectors.insert(
        "mock".to_string(),
        RegisteredConnector {
            display_name: "Mock".to_string(),
            connector: Arc::new(CallbackMock::with_test_identity()),
        },
    );
    extra(&mut connectors);

    let app = create_router(AppState::new(config, storage.clone(), connectors));
    TestEnv { app, storage }
}

/// The registered test client: confidential, one redirect URI.
pub fn test_client() -> Client {
    Client {
        id: "test-app".to_string(),
        secret: "app-secret".to_string(),
        redirect_uris: vec!["https://app.example.com/cb".to_string()],
        trusted_peers: Vec::new(),
        public: false,
        name: "Test App".to_string(),
        logo_url: String::new(),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("utf-8 body")
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    /// The `Location` header of a redirect.
    pub fn location(&self) -> String {
        self.headers
            .get(LOCATION)
            .expect("location header")
            .to_str()
            .unwrap()
            .to_string()
    }

    /// The `Location` header as a router-relative path with query.
    pub fn location_path(&self) -> String {
        relative(&self.location())
    }
}

/// Strips the issuer from an absolute URL so it can be replayed against the
/// router.
pub fn relative(location: &str) -> String {
    match location.strip_prefix(ISSUER) {
        Some(rest) => rest.to_string(),
        None => location.to_string(),
    }
}

/// Extracts a query parameter from a URL or path.
pub fn query_param(location: &str, name: &str) -> Option<String> {
    let url = if location.starts_with('/') {
        url::Url::parse(&format!("{ISSUER}{location}")).ok()?
    } else {
        url::Url::parse(location).ok()?
    };
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_form(
    app: &Router,
    uri: &str,
    form: &[(&str, &str)],
    basic_auth: Option<(&str, &str)>,
) -> TestResponse {
    let body = serde_urlencoded::to_string(form).unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some((user, password)) = basic_auth {
        let credentials = STANDARD.encode(format!("{user}:{password}"));
        builder = builder.header(AUTHORIZATION, format!("Basic {credentials}"));
    }
    send(app, builder.body(Body::from(body)).unwrap()).await
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Drives the happy path from `/auth` until the approval redirect is
/// issued, returning the final redirect's `Location`.
///
/// Assumes `skip_approval` is on and the `mock` connector is the only one
/// registered.
pub async fn login_until_redirect(app: &Router, auth_query: &str) -> String {
    // /auth picks the only connector.
    let response = get(app, &format!("/auth?{auth_query}")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER, "{}", response.text());
    let connector_login = response.location_path();

    // The connector redirects to the upstream provider, which immediately
    // bounces back to /callback with our state.
    let response = get(app, &connector_login).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let callback = response.location_path();

    let response = get(app, &callback).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let approval = response.location_path();

    let response = get(app, &approval).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER, "{}", response.text());
    response.location()
}

/// Verifies a compact JWS against the published JWKS and returns its
/// payload.
pub async fn verify_against_jwks(app: &Router, id_token: &str) -> serde_json::Value {
    let response = get(app, "/keys").await;
    assert_eq!(response.status, StatusCode::OK);
    let jwks: portico_crypto::JsonWebKeySet = serde_json::from_slice(&response.body).unwrap();

    let header_b64 = id_token.split('.').next().expect("jws header");
    let header: serde_json::Value = serde_json::from_slice(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(header_b64)
            .unwrap(),
    )
    .unwrap();
    let kid = header["kid"].as_str().expect("kid");

    let key = jwks.find_key(kid).expect("token key in published JWKS");
    let payload = portico_crypto::sign::verify_jws(id_token, key).expect("signature verifies");
    serde_json::from_slice(&payload).unwrap()
}
