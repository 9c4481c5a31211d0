//! Authorization flow handlers.
//!
//! Drives an auth request through its lifecycle:
//!
//! ```text
//! /auth            create the request, pick (or choose) a connector
//! /auth/{conn}     record the connector; redirect upstream or prompt for a password
//! /callback        complete a redirect-based login
//! /approval        consent, then issue the code/fragment response
//! ```
//!
//! Everything before the redirect URI is validated renders HTML errors;
//! after that, errors go back to the client as redirects.

use std::collections::HashMap;

use axum::Form;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use url::Url;

use portico_connector::{CallbackData, Identity, Scopes};
use portico_crypto::new_id;
use portico_model::client::REDIRECT_URI_OOB;
use portico_model::{AuthCode, AuthRequest, Claims, Client};
use portico_oidc::error::OauthError;
use portico_oidc::request::{
    AuthorizationForm, RESPONSE_TYPE_CODE, RESPONSE_TYPE_TOKEN, classify_scopes,
    validate_response_types,
};
use portico_oidc::scopes::SCOPE_CROSS_CLIENT_PREFIX;

use crate::pages;
use crate::state::AppState;

use super::redirect_error;

/// GET `/auth`
pub async fn authorize_get(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    match parse_authorization_form(query.as_deref().unwrap_or("")) {
        Ok(form) => handle_authorization(&state, form).await,
        Err(response) => response,
    }
}

/// POST `/auth`
pub async fn authorize_post(State(state): State<AppState>, body: String) -> Response {
    match parse_authorization_form(&body) {
        Ok(form) => handle_authorization(&state, form).await,
        Err(response) => response,
    }
}

fn parse_authorization_form(raw: &str) -> Result<AuthorizationForm, Response> {
    serde_urlencoded::from_str(raw).map_err(|_| {
        pages::error_page(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Failed to parse request.",
        )
    })
}

async fn handle_authorization(state: &AppState, form: AuthorizationForm) -> Response {
    // The client and redirect URI must check out before anything can be
    // redirected; failures here render HTML.
    let client = match state.storage.get_client(&form.client_id).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return pages::error_page(
                StatusCode::BAD_REQUEST,
                "unauthorized_client",
                &format!("Invalid client_id ({:?}).", form.client_id),
            );
        }
        Err(err) => {
            tracing::error!("failed to get client {:?}: {err}", form.client_id);
            return pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Database error.",
            );
        }
    };

    if !client.accepts_redirect_uri(&form.redirect_uri) {
        return pages::error_page(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            &format!("Unregistered redirect_uri ({:?}).", form.redirect_uri),
        );
    }

    if let Err(err) = validate_authorization(state, &client, &form).await {
        return redirect_error(&form.redirect_uri, &form.state, &err);
    }

    let auth_req = AuthRequest {
        id: new_id(),
        client_id: client.id,
        response_types: form.response_types(),
        scopes: form.scopes(),
        redirect_uri: form.redirect_uri,
        state: form.state,
        nonce: form.nonce,
        force_approval_prompt: form.approval_prompt == "force",
        logged_in: false,
        claims: None,
        connector_id: None,
        connector_data: Vec::new(),
        expiry: state.now() + state.config.auth_request_lifetime(),
    };
    if let Err(err) = state.storage.create_auth_request(auth_req.clone()).await {
        tracing::error!("failed to create authorization request: {err}");
        return pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Database error.",
        );
    }

    // A single registered connector needs no chooser.
    if state.connectors.len() == 1
        && let Some(id) = state.connectors.keys().next()
    {
        return Redirect::to(&format!(
            "/auth/{}?req={}",
            urlencoding::encode(id),
            auth_req.id
        ))
        .into_response();
    }

    let mut connectors: Vec<(String, String)> = state
        .connectors
        .iter()
        .map(|(id, registered)| (id.clone(), registered.display_name.clone()))
        .collect();
    connectors.sort();
    pages::login_chooser(&connectors, &auth_req.id)
}

/// The validation steps whose failures redirect back to the client.
async fn validate_authorization(
    state: &AppState,
    client: &Client,
    form: &AuthorizationForm,
) -> Result<(), OauthError> {
    let scopes = form.scopes();
    let classified = classify_scopes(&scopes);
    if !classified.has_openid {
        return Err(OauthError::InvalidScope(
            r#"missing required scope(s) ["openid"]"#.to_string(),
        ));
    }
    if !classified.unrecognized.is_empty() {
        return Err(OauthError::InvalidScope(format!(
            "unrecognized scope(s) {:?}",
            classified.unrecognized
        )));
    }
    for peer_id in &classified.cross_client_peers {
        if !state.cross_client_trusted(&client.id, peer_id).await? {
            return Err(OauthError::InvalidScope(format!(
                "client can't request scope {:?}",
                format!("{SCOPE_CROSS_CLIENT_PREFIX}{peer_id}")
            )));
        }
    }

    validate_response_types(
        &form.response_types(),
        &state.config.supported_response_types,
        &form.nonce,
        &form.redirect_uri,
    )
}

/// The `req` query parameter carried through the login pages.
#[derive(Debug, Default, Deserialize)]
pub struct ReqQuery {
    #[serde(default)]
    req: String,
}

/// GET `/auth/{connector}`
pub async fn connector_login_get(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
    Query(query): Query<ReqQuery>,
) -> Response {
    let Some(registered) = state.connectors.get(&connector_id) else {
        return unknown_connector();
    };
    let auth_req = match fetch_auth_request(&state, &query.req).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };

    // Record the connector for the callback before leaving the provider.
    let set_connector = state
        .storage
        .update_auth_request(&auth_req.id, &mut |mut a| {
            a.connector_id = Some(connector_id.clone());
            Ok(a)
        })
        .await;
    if let Err(err) = set_connector {
        tracing::error!("failed to set connector on auth request: {err}");
        return pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Database error.",
        );
    }

    let scopes = Scopes::from_scope_list(&auth_req.scopes);
    if let Some(callback) = registered.connector.as_callback() {
        // The auth request ID doubles as the state round-tripped through
        // the upstream provider.
        match callback.login_url(&scopes, &state.absolute_url("/callback"), &auth_req.id) {
            Ok(url) => Redirect::to(&url).into_response(),
            Err(err) => {
                tracing::error!("connector {connector_id:?} failed to build login URL: {err}");
                pages::error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "Login error.",
                )
            }
        }
    } else if registered.connector.as_password().is_some() {
        pages::password_prompt(&connector_id, &auth_req.id, "", false)
    } else {
        pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Connector does not support logins.",
        )
    }
}

/// The password login form.
#[derive(Debug, Default, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
}

/// POST `/auth/{connector}`
pub async fn connector_login_post(
    State(state): State<AppState>,
    Path(connector_id): Path<String>,
    Query(query): Query<ReqQuery>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let Some(registered) = state.connectors.get(&connector_id) else {
        return unknown_connector();
    };
    let Some(password_connector) = registered.connector.as_password() else {
        return pages::error_page(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Connector does not support password logins.",
        );
    };
    let auth_req = match fetch_auth_request(&state, &query.req).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };

    let scopes = Scopes::from_scope_list(&auth_req.scopes);
    match password_connector
        .login(&scopes, &form.login, &form.password)
        .await
    {
        Err(err) => {
            tracing::error!("failed to log in user: {err}");
            pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Login error.",
            )
        }
        // Bad credentials: re-prompt without touching the auth request.
        Ok(None) => pages::password_prompt(&connector_id, &auth_req.id, &form.login, true),
        Ok(Some(identity)) => {
            match finalize_login(&state, &auth_req.id, &connector_id, identity).await {
                Ok(location) => Redirect::to(&location).into_response(),
                Err(response) => response,
            }
        }
    }
}

/// GET `/callback`
pub async fn callback(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    let query: HashMap<String, String> =
        url::form_urlencoded::parse(raw.as_deref().unwrap_or("").as_bytes())
            .into_owned()
            .collect();

    let Some(req_id) = query.get("state").filter(|s| !s.is_empty()).cloned() else {
        return pages::error_page(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "User session error.",
        );
    };
    let auth_req = match fetch_auth_request(&state, &req_id).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };

    let Some(connector_id) = auth_req.connector_id.clone() else {
        tracing::error!("callback for auth request {req_id:?} with no connector selected");
        return pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "User session error.",
        );
    };
    let Some(registered) = state.connectors.get(&connector_id) else {
        tracing::error!("connector {connector_id:?} not found");
        return pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Requested resource does not exist.",
        );
    };
    let Some(callback_connector) = registered.connector.as_callback() else {
        return pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Requested resource does not exist.",
        );
    };

    let scopes = Scopes::from_scope_list(&auth_req.scopes);
    match callback_connector
        .handle_callback(&scopes, CallbackData { query })
        .await
    {
        Err(err) => {
            tracing::error!("failed to authenticate: {err}");
            pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Failed to return user's identity.",
            )
        }
        Ok(identity) => match finalize_login(&state, &auth_req.id, &connector_id, identity).await {
            Ok(location) => Redirect::to(&location).into_response(),
            Err(response) => response,
        },
    }
}

/// Records the identity on the auth request and hands the browser to the
/// approval page.
async fn finalize_login(
    state: &AppState,
    auth_req_id: &str,
    connector_id: &str,
    identity: Identity,
) -> Result<String, Response> {
    let claims = Claims {
        user_id: identity.user_id,
        username: identity.username,
        email: identity.email,
        email_verified: identity.email_verified,
        groups: identity.groups,
    };
    let connector_data = identity.connector_data;

    let update = state
        .storage
        .update_auth_request(auth_req_id, &mut |mut a| {
            a.logged_in = true;
            a.claims = Some(claims.clone());
            a.connector_data = connector_data.clone();
            a.connector_id = Some(connector_id.to_string());
            Ok(a)
        })
        .await;
    if let Err(err) = update {
        tracing::error!("failed to finalize login: {err}");
        return Err(pages::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Login error.",
        ));
    }
    Ok(format!("/approval?req={auth_req_id}"))
}

/// GET `/approval`
pub async fn approval_get(State(state): State<AppState>, Query(query): Query<ReqQuery>) -> Response {
    let auth_req = match fetch_auth_request(&state, &query.req).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };
    if !auth_req.logged_in {
        return login_not_finalized();
    }

    if state.config.skip_approval && !auth_req.force_approval_prompt {
        return send_code_response(&state, auth_req).await;
    }

    let client_name = match state.storage.get_client(&auth_req.client_id).await {
        Ok(client) if !client.name.is_empty() => client.name,
        Ok(client) => client.id,
        Err(err) => {
            tracing::error!("failed to get client {:?}: {err}", auth_req.client_id);
            return pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Failed to retrieve client.",
            );
        }
    };
    let username = auth_req
        .claims
        .as_ref()
        .map(|claims| claims.username.clone())
        .unwrap_or_default();
    pages::approval_page(&auth_req.id, &username, &client_name, &auth_req.scopes)
}

/// The consent form.
#[derive(Debug, Default, Deserialize)]
pub struct ApprovalForm {
    #[serde(default)]
    req: String,
    #[serde(default)]
    approval: String,
}

/// POST `/approval`
pub async fn approval_post(
    State(state): State<AppState>,
    Query(query): Query<ReqQuery>,
    Form(form): Form<ApprovalForm>,
) -> Response {
    let req_id = if form.req.is_empty() {
        query.req
    } else {
        form.req
    };
    let auth_req = match fetch_auth_request(&state, &req_id).await {
        Ok(auth_req) => auth_req,
        Err(response) => return response,
    };
    if !auth_req.logged_in {
        return login_not_finalized();
    }

    if form.approval != "approve" {
        if auth_req.redirect_uri == REDIRECT_URI_OOB {
            return pages::error_page(
                StatusCode::BAD_REQUEST,
                "access_denied",
                "Approval rejected.",
            );
        }
        return redirect_error(
            &auth_req.redirect_uri,
            &auth_req.state,
            &OauthError::AccessDenied("user denied the request".to_string()),
        );
    }
    send_code_response(&state, auth_req).await
}

/// Issues the code and/or fragment response and retires the auth request.
async fn send_code_response(state: &AppState, auth_req: AuthRequest) -> Response {
    let now = state.now();
    if now > auth_req.expiry {
        return pages::error_page(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "User session has expired.",
        );
    }
    let Some(claims) = auth_req.claims.clone() else {
        return login_not_finalized();
    };
    let connector_id = auth_req.connector_id.clone().unwrap_or_default();

    let mut code_param = None;
    let mut fragment = None;

    for response_type in &auth_req.response_types {
        match response_type.as_str() {
            RESPONSE_TYPE_CODE => {
                let code = AuthCode {
                    id: new_id(),
                    client_id: auth_req.client_id.clone(),
                    connector_id: connector_id.clone(),
                    nonce: auth_req.nonce.clone(),
                    scopes: auth_req.scopes.clone(),
                    claims: claims.clone(),
                    connector_data: auth_req.connector_data.clone(),
                    redirect_uri: auth_req.redirect_uri.clone(),
                    expiry: now + state.config.auth_code_lifetime(),
                };
                if let Err(err) = state.storage.create_auth_code(code.clone()).await {
                    tracing::error!("failed to create auth code: {err}");
                    return internal_error();
                }

                if auth_req.redirect_uri == REDIRECT_URI_OOB {
                    if let Err(response) = retire_auth_request(state, &auth_req.id).await {
                        return response;
                    }
                    return pages::oob_page(&code.id);
                }
                code_param = Some(code.id);
            }
            RESPONSE_TYPE_TOKEN => {
                let minted = state
                    .mint_id_token(
                        &auth_req.client_id,
                        &connector_id,
                        &claims,
                        &auth_req.scopes,
                        &auth_req.nonce,
                    )
                    .await;
                let (id_token, expiry) = match minted {
                    Ok(minted) => minted,
                    Err(err) => {
                        tracing::error!("failed to create ID token: {}", err.error_code());
                        return internal_error();
                    }
                };
                let params = [
                    ("access_token", new_id()),
                    ("token_type", "bearer".to_string()),
                    ("id_token", id_token),
                    ("state", auth_req.state.clone()),
                    ("expires_in", (expiry - now).num_seconds().to_string()),
                ];
                fragment = Some(serde_urlencoded::to_string(params).unwrap_or_default());
            }
            _ => {}
        }
    }

    if let Err(response) = retire_auth_request(state, &auth_req.id).await {
        return response;
    }

    let mut url = match Url::parse(&auth_req.redirect_uri) {
        Ok(url) => url,
        Err(_) => {
            return pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Invalid redirect URI.",
            );
        }
    };
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(code) = &code_param {
            pairs.append_pair("code", code);
        }
        pairs.append_pair("state", &auth_req.state);
    }
    if let Some(fragment) = &fragment {
        url.set_fragment(Some(fragment));
    }
    Redirect::to(url.as_str()).into_response()
}

/// Deletes the auth request once a response has been issued. A concurrent
/// deletion is fine; anything else is not.
async fn retire_auth_request(state: &AppState, id: &str) -> Result<(), Response> {
    match state.storage.delete_auth_request(id).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => {
            tracing::debug!("auth request {id:?} already deleted");
            Ok(())
        }
        Err(err) => {
            tracing::error!("failed to delete auth request: {err}");
            Err(internal_error())
        }
    }
}

async fn fetch_auth_request(state: &AppState, id: &str) -> Result<AuthRequest, Response> {
    match state.storage.get_auth_request(id).await {
        Ok(auth_req) => Ok(auth_req),
        Err(err) if err.is_not_found() => Err(pages::error_page(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Unknown or expired login session.",
        )),
        Err(err) => {
            tracing::error!("failed to get auth request: {err}");
            Err(pages::error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Database error.",
            ))
        }
    }
}

fn unknown_connector() -> Response {
    pages::error_page(
        StatusCode::NOT_FOUND,
        "invalid_request",
        "Requested connector does not exist.",
    )
}

fn login_not_finalized() -> Response {
    pages::error_page(
        StatusCode::BAD_REQUEST,
        "invalid_request",
        "Login process not yet finalized.",
    )
}

fn internal_error() -> Response {
    pages::error_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        "server_error",
        "Internal server error.",
    )
}
