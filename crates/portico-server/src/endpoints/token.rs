//! Token endpoint handler.
//!
//! POST `/token` authenticates the client (HTTP Basic preferred, form
//! fallback) and exchanges either an authorization code (RFC 6749 §4.1.3)
//! or a refresh token (§6) for a signed ID token.
//!
//! Storage mutations on the success path are strictly ordered: mint the
//! token, delete the consumed grant, create its replacement, respond. A
//! failure anywhere short-circuits with `server_error` and does not roll
//! forward.

use axum::Form;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};

use portico_connector::{Identity, Scopes};
use portico_crypto::new_id;
use portico_model::{Client, RefreshToken};
use portico_oidc::error::{OauthError, OauthResult};
use portico_oidc::scopes::SCOPE_OFFLINE_ACCESS;
use portico_oidc::token::{
    GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_REFRESH_TOKEN, TokenForm, TokenResponse,
};

use crate::state::AppState;

use super::token_error;

/// POST `/token`
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Response {
    let (client_id, client_secret) = match client_credentials(&headers, &form) {
        Ok(credentials) => credentials,
        Err(err) => return token_error(&err),
    };

    let client = match state.storage.get_client(&client_id).await {
        Ok(client) => client,
        Err(err) if err.is_not_found() => {
            return token_error(&OauthError::InvalidClient(
                "invalid client credentials".to_string(),
            ));
        }
        Err(err) => {
            tracing::error!("failed to get client: {err}");
            return token_error(&OauthError::server_error());
        }
    };
    if client.secret != client_secret {
        return token_error(&OauthError::InvalidClient(
            "invalid client credentials".to_string(),
        ));
    }

    let result = match form.grant_type.as_str() {
        GRANT_TYPE_AUTHORIZATION_CODE => exchange_code(&state, &client, &form).await,
        GRANT_TYPE_REFRESH_TOKEN => exchange_refresh(&state, &client, &form).await,
        _ => Err(OauthError::InvalidGrant(String::new())),
    };
    match result {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(err) => token_error(&err),
    }
}

/// Extracts client credentials from the Authorization header or the form.
///
/// Basic credentials are URL-decoded per RFC 6749 §2.3.1.
fn client_credentials(headers: &HeaderMap, form: &TokenForm) -> OauthResult<(String, String)> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| OauthError::InvalidClient("invalid authorization header".to_string()))?;
        if let Some(encoded) = value.strip_prefix("Basic ") {
            let decoded = STANDARD
                .decode(encoded.trim())
                .map_err(|_| OauthError::InvalidClient("invalid basic auth encoding".to_string()))?;
            let text = String::from_utf8(decoded)
                .map_err(|_| OauthError::InvalidClient("invalid basic auth encoding".to_string()))?;
            let (client_id, client_secret) = text
                .split_once(':')
                .ok_or_else(|| OauthError::InvalidClient("invalid basic auth format".to_string()))?;

            let client_id = urlencoding::decode(client_id).map_err(|_| {
                OauthError::InvalidRequest("client_id improperly encoded".to_string())
            })?;
            let client_secret = urlencoding::decode(client_secret).map_err(|_| {
                OauthError::InvalidRequest("client_secret improperly encoded".to_string())
            })?;
            return Ok((client_id.into_owned(), client_secret.into_owned()));
        }
    }
    Ok((form.client_id.clone(), form.client_secret.clone()))
}

/// The authorization-code exchange.
async fn exchange_code(
    state: &AppState,
    client: &Client,
    form: &TokenForm,
) -> OauthResult<TokenResponse> {
    let auth_code = match state.storage.get_auth_code(&form.code).await {
        Ok(code) => code,
        Err(err) if err.is_not_found() => {
            return Err(OauthError::InvalidGrant(
                "invalid or expired code parameter".to_string(),
            ));
        }
        Err(err) => {
            tracing::error!("failed to get auth code: {err}");
            return Err(OauthError::server_error());
        }
    };
    let now = state.now();
    if now > auth_code.expiry || auth_code.client_id != client.id {
        return Err(OauthError::InvalidGrant(
            "invalid or expired code parameter".to_string(),
        ));
    }
    if auth_code.redirect_uri != form.redirect_uri {
        return Err(OauthError::InvalidRequest(
            "redirect_uri did not match URI from initial request".to_string(),
        ));
    }

    let (id_token, expiry) = state
        .mint_id_token(
            &client.id,
            &auth_code.connector_id,
            &auth_code.claims,
            &auth_code.scopes,
            &auth_code.nonce,
        )
        .await?;

    // Deleting the code is the commit point of redemption. A code that
    // cannot be deleted must not produce a token, or the client could
    // redeem it twice.
    if let Err(err) = state.storage.delete_auth_code(&auth_code.id).await {
        tracing::error!("failed to delete auth code: {err}");
        return Err(OauthError::server_error());
    }

    let mut refresh_token = None;
    if auth_code.scopes.iter().any(|s| s == SCOPE_OFFLINE_ACCESS) {
        let refresh = RefreshToken {
            id: new_id(),
            client_id: auth_code.client_id.clone(),
            connector_id: auth_code.connector_id.clone(),
            scopes: auth_code.scopes.clone(),
            nonce: auth_code.nonce.clone(),
            claims: auth_code.claims.clone(),
            connector_data: auth_code.connector_data.clone(),
        };
        if let Err(err) = state.storage.create_refresh(refresh.clone()).await {
            tracing::error!("failed to create refresh token: {err}");
            return Err(OauthError::server_error());
        }
        refresh_token = Some(refresh.id);
    }

    Ok(token_response(state, id_token, refresh_token, expiry))
}

/// The refresh-token exchange.
async fn exchange_refresh(
    state: &AppState,
    client: &Client,
    form: &TokenForm,
) -> OauthResult<TokenResponse> {
    if form.refresh_token.is_empty() {
        return Err(OauthError::InvalidRequest(
            "no refresh token in request".to_string(),
        ));
    }

    let mut refresh = match state.storage.get_refresh(&form.refresh_token).await {
        Ok(refresh) => refresh,
        Err(err) if err.is_not_found() => {
            return Err(OauthError::InvalidGrant(
                "refresh token is invalid or has already been claimed".to_string(),
            ));
        }
        Err(err) => {
            tracing::error!("failed to get refresh token: {err}");
            return Err(OauthError::server_error());
        }
    };
    if refresh.client_id != client.id {
        return Err(OauthError::InvalidGrant(
            "refresh token is invalid or has already been claimed".to_string(),
        ));
    }

    // RFC 6749 §6: omitted scopes default to the originally authorized
    // set; supplied scopes must be a subset of it.
    let scopes = if form.scope.is_empty() {
        refresh.scopes.clone()
    } else {
        let requested: Vec<String> = form.scope.split_whitespace().map(String::from).collect();
        let unauthorized: Vec<&String> = requested
            .iter()
            .filter(|scope| !refresh.scopes.contains(scope))
            .collect();
        if !unauthorized.is_empty() {
            return Err(OauthError::InvalidRequest(format!(
                "requested scopes contain unauthorized scope(s): {unauthorized:?}"
            )));
        }
        requested
    };

    let Some(registered) = state.connectors.get(&refresh.connector_id) else {
        tracing::error!("connector {:?} not found", refresh.connector_id);
        return Err(OauthError::server_error());
    };

    // Connectors that can refresh get a chance to update the identity
    // before the new token is minted.
    if let Some(refresher) = registered.connector.as_refresh() {
        let identity = Identity {
            user_id: refresh.claims.user_id.clone(),
            username: refresh.claims.username.clone(),
            email: refresh.claims.email.clone(),
            email_verified: refresh.claims.email_verified,
            groups: refresh.claims.groups.clone(),
            connector_data: refresh.connector_data.clone(),
        };
        match refresher
            .refresh(&Scopes::from_scope_list(&scopes), identity)
            .await
        {
            Ok(refreshed) => {
                // user_id intentionally not overwritten.
                refresh.claims.username = refreshed.username;
                refresh.claims.email = refreshed.email;
                refresh.claims.email_verified = refreshed.email_verified;
                refresh.claims.groups = refreshed.groups;
                refresh.connector_data = refreshed.connector_data;
            }
            Err(err) => {
                tracing::error!("failed to refresh identity: {err}");
                return Err(OauthError::server_error());
            }
        }
    }

    let (id_token, expiry) = state
        .mint_id_token(
            &client.id,
            &refresh.connector_id,
            &refresh.claims,
            &scopes,
            &refresh.nonce,
        )
        .await?;

    // Refresh tokens are claimed exactly once: delete the current row,
    // then recreate it under a fresh ID. The new ID is unknown to anyone
    // until the response, so no intermediate state is observable.
    if let Err(err) = state.storage.delete_refresh(&refresh.id).await {
        tracing::error!("failed to delete refresh token: {err}");
        return Err(OauthError::server_error());
    }
    refresh.id = new_id();
    if let Err(err) = state.storage.create_refresh(refresh.clone()).await {
        tracing::error!("failed to create refresh token: {err}");
        return Err(OauthError::server_error());
    }

    Ok(token_response(state, id_token, Some(refresh.id), expiry))
}

fn token_response(
    state: &AppState,
    id_token: String,
    refresh_token: Option<String>,
    expiry: DateTime<Utc>,
) -> TokenResponse {
    // The access token is an opaque random value so nothing comes to
    // depend on its structure.
    TokenResponse {
        access_token: new_id(),
        token_type: "bearer".to_string(),
        expires_in: (expiry - state.now()).num_seconds(),
        refresh_token,
        id_token,
    }
}
