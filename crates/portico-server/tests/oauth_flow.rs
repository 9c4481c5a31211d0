//! End-to-end flow tests: authorization code, replay, refresh rotation,
//! scope narrowing, cross-client audiences, and expiry, driven through the
//! router.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use portico_oidc::claims::decode_subject;

use common::{
    get, login_until_redirect, post_form, query_param, relative, test_client, test_env,
    verify_against_jwks,
};

const REDIRECT_URI: &str = "https://app.example.com/cb";

fn auth_query(params: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(params).unwrap()
}

fn code_flow_query(scope: &str) -> String {
    auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "code"),
        ("scope", scope),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
    ])
}

/// Runs the code flow to completion and returns the token response JSON.
async fn obtain_tokens(env: &common::TestEnv, scope: &str) -> serde_json::Value {
    let redirect = login_until_redirect(&env.app, &code_flow_query(scope)).await;
    assert!(redirect.starts_with(REDIRECT_URI));
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("xyz"));
    let code = query_param(&redirect, "code").expect("code in redirect");

    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    response.json()
}

#[tokio::test]
async fn code_flow_issues_verified_id_token() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let tokens = obtain_tokens(&env, "openid email").await;
    assert_eq!(tokens["token_type"], "bearer");
    assert!(tokens["expires_in"].as_i64().unwrap() > 0);
    assert!(tokens.get("refresh_token").is_none());

    let claims = verify_against_jwks(&env.app, tokens["id_token"].as_str().unwrap()).await;
    assert_eq!(claims["iss"], common::ISSUER);
    assert_eq!(claims["aud"], "test-app");
    assert!(claims.get("azp").is_none());
    assert_eq!(claims["email"], "kilgore@kilgore.trout");
    assert_eq!(claims["email_verified"], true);

    let subject = decode_subject(claims["sub"].as_str().unwrap()).unwrap();
    assert_eq!(subject.conn_id, "mock");
    assert_eq!(subject.user_id, "0-385-28089-0");
}

#[tokio::test]
async fn code_replay_is_invalid_grant() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let redirect = login_until_redirect(&env.app, &code_flow_query("openid")).await;
    let code = query_param(&redirect, "code").unwrap();
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
    ];

    let first = post_form(&env.app, "/token", &form, Some(("test-app", "app-secret"))).await;
    assert_eq!(first.status, StatusCode::OK);

    let replay = post_form(&env.app, "/token", &form, Some(("test-app", "app-secret"))).await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn offline_access_rotates_refresh_tokens() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let tokens = obtain_tokens(&env, "openid email offline_access").await;
    let r1 = tokens["refresh_token"].as_str().expect("refresh token");

    let response = post_form(
        &env.app,
        "/token",
        &[("grant_type", "refresh_token"), ("refresh_token", r1)],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let refreshed = response.json();
    let r2 = refreshed["refresh_token"].as_str().expect("rotated token");
    assert_ne!(r1, r2);

    let claims = verify_against_jwks(&env.app, refreshed["id_token"].as_str().unwrap()).await;
    assert_eq!(claims["aud"], "test-app");

    // The prior token is gone.
    let err = env.storage.get_refresh(r1).await.unwrap_err();
    assert!(err.is_not_found());
    let reuse = post_form(
        &env.app,
        "/token",
        &[("grant_type", "refresh_token"), ("refresh_token", r1)],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(reuse.status, StatusCode::BAD_REQUEST);
    assert_eq!(reuse.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn refresh_scopes_narrow_but_never_widen() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let tokens = obtain_tokens(&env, "openid email offline_access").await;
    let r1 = tokens["refresh_token"].as_str().unwrap();

    // Narrowing to a subset succeeds.
    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", r1),
            ("scope", "openid"),
        ],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    let claims = verify_against_jwks(&env.app, response.json()["id_token"].as_str().unwrap()).await;
    // Without the email scope the claim is dropped.
    assert!(claims.get("email").is_none());
    let r2 = response.json()["refresh_token"].as_str().unwrap().to_string();

    // Widening beyond the original grant fails.
    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", &r2),
            ("scope", "openid groups"),
        ],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_request");
}

#[tokio::test]
async fn cross_client_audience_and_azp() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    // "test-app" trusts "cli" to mint tokens audienced at it.
    let mut app_client = test_client();
    app_client.trusted_peers = vec!["cli".to_string()];
    env.storage.create_client(app_client).await.unwrap();
    env.storage
        .create_client(portico_model::Client {
            id: "cli".to_string(),
            secret: "cli-secret".to_string(),
            redirect_uris: vec!["https://cli.example.com/cb".to_string()],
            ..portico_model::Client::default()
        })
        .await
        .unwrap();

    let query = auth_query(&[
        ("client_id", "cli"),
        ("response_type", "code"),
        ("scope", "openid audience:server:client_id:test-app"),
        ("redirect_uri", "https://cli.example.com/cb"),
        ("state", "s"),
    ]);
    let redirect = login_until_redirect(&env.app, &query).await;
    let code = query_param(&redirect, "code").unwrap();

    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "https://cli.example.com/cb"),
        ],
        Some(("cli", "cli-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let claims = verify_against_jwks(&env.app, response.json()["id_token"].as_str().unwrap()).await;
    assert_eq!(claims["aud"], "test-app");
    assert_eq!(claims["azp"], "cli");
}

#[tokio::test]
async fn untrusted_cross_client_scope_is_rejected() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();
    env.storage
        .create_client(portico_model::Client {
            id: "cli".to_string(),
            secret: "cli-secret".to_string(),
            redirect_uris: vec!["https://cli.example.com/cb".to_string()],
            ..portico_model::Client::default()
        })
        .await
        .unwrap();

    // "test-app" does not list "cli" as a trusted peer.
    let query = auth_query(&[
        ("client_id", "cli"),
        ("response_type", "code"),
        ("scope", "openid audience:server:client_id:test-app"),
        ("redirect_uri", "https://cli.example.com/cb"),
        ("state", "s"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location();
    assert!(location.starts_with("https://cli.example.com/cb?"));
    assert_eq!(
        query_param(&location, "error").as_deref(),
        Some("invalid_scope")
    );
    assert_eq!(query_param(&location, "state").as_deref(), Some("s"));
}

#[tokio::test]
async fn expired_code_is_invalid_grant() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let redirect = login_until_redirect(&env.app, &code_flow_query("openid")).await;
    let code = query_param(&redirect, "code").unwrap();

    // Thirty-one minutes later the code has been garbage collected.
    let result = env
        .storage
        .garbage_collect(Utc::now() + Duration::minutes(31))
        .await
        .unwrap();
    assert_eq!(result.auth_codes, 1);

    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn tokens_survive_key_rotation() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let tokens = obtain_tokens(&env, "openid").await;
    let id_token = tokens["id_token"].as_str().unwrap().to_string();

    // Rotate: retire the current public key into the verification set and
    // install a fresh signing key.
    let new_key = portico_crypto::SigningKey::generate().unwrap();
    let new_public = portico_crypto::Signer::from_key(&new_key)
        .unwrap()
        .public_jwk()
        .unwrap();
    env.storage
        .update_keys(&mut |mut keys| {
            let retired = keys.signing_key_pub.take().unwrap();
            keys.verification_keys.push(portico_model::VerificationKey {
                public_key: retired,
                expiry: Utc::now() + Duration::hours(24),
            });
            keys.signing_key = Some(new_key.clone());
            keys.signing_key_pub = Some(new_public.clone());
            keys.next_rotation = Utc::now() + Duration::hours(6);
            Ok(keys)
        })
        .await
        .unwrap();

    // The old token still verifies against the published set, and new
    // tokens use the new key.
    let claims = verify_against_jwks(&env.app, &id_token).await;
    assert_eq!(claims["aud"], "test-app");

    let fresh = obtain_tokens(&env, "openid").await;
    let fresh_claims = verify_against_jwks(&env.app, fresh["id_token"].as_str().unwrap()).await;
    assert_eq!(fresh_claims["aud"], "test-app");
}

#[tokio::test]
async fn wrong_client_secret_is_unauthorized() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let redirect = login_until_redirect(&env.app, &code_flow_query("openid")).await;
    let code = query_param(&redirect, "code").unwrap();

    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
        Some(("test-app", "wrong-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "invalid_client");
}

#[tokio::test]
async fn exchange_requires_matching_redirect_uri() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let redirect = login_until_redirect(&env.app, &code_flow_query("openid")).await;
    let code = query_param(&redirect, "code").unwrap();

    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "https://app.example.com/other"),
        ],
        Some(("test-app", "app-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_request");
}

#[tokio::test]
async fn unknown_client_renders_error_page() {
    let env = test_env(|_| {}, |_| {}).await;

    let query = auth_query(&[
        ("client_id", "ghost"),
        ("response_type", "code"),
        ("scope", "openid"),
        ("redirect_uri", REDIRECT_URI),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    // No redirect: the client is unknown, so nothing can be trusted.
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("unauthorized_client"));
}

#[tokio::test]
async fn unregistered_redirect_uri_renders_error_page() {
    let env = test_env(|_| {}, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "code"),
        ("scope", "openid"),
        ("redirect_uri", "https://evil.example.com/cb"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("invalid_request"));
}

#[tokio::test]
async fn scope_errors_redirect_to_client() {
    let env = test_env(|_| {}, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    // Unrecognized scope.
    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "code"),
        ("scope", "openid made_up"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location();
    assert_eq!(
        query_param(&location, "error").as_deref(),
        Some("invalid_scope")
    );
    assert_eq!(query_param(&location, "state").as_deref(), Some("xyz"));

    // Missing openid.
    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "code"),
        ("scope", "email"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        query_param(&response.location(), "error").as_deref(),
        Some("invalid_scope")
    );
}

#[tokio::test]
async fn undeclared_response_type_redirects_error() {
    let env = test_env(|_| {}, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    // The default server configuration only offers "code".
    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "token"),
        ("scope", "openid"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
        ("nonce", "n"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        query_param(&response.location(), "error").as_deref(),
        Some("unsupported_response_type")
    );
}

#[tokio::test]
async fn implicit_flow_returns_fragment() {
    let env = test_env(
        |c| {
            c.skip_approval = true;
            c.supported_response_types = vec!["code".to_string(), "token".to_string()];
        },
        |_| {},
    )
    .await;
    env.storage.create_client(test_client()).await.unwrap();

    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "token"),
        ("scope", "openid email"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
        ("nonce", "n-1"),
    ]);
    let redirect = login_until_redirect(&env.app, &query).await;

    let url = url::Url::parse(&redirect).unwrap();
    assert!(query_param(&redirect, "code").is_none());

    let fragment = url.fragment().expect("fragment response");
    let params: std::collections::HashMap<String, String> =
        url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
    assert_eq!(params["token_type"], "bearer");
    assert_eq!(params["state"], "xyz");
    assert!(params["expires_in"].parse::<i64>().unwrap() > 0);
    assert!(!params["access_token"].is_empty());

    let claims = verify_against_jwks(&env.app, &params["id_token"]).await;
    assert_eq!(claims["nonce"], "n-1");
    assert_eq!(claims["aud"], "test-app");
}

#[tokio::test]
async fn implicit_flow_requires_nonce() {
    let env = test_env(
        |c| c.supported_response_types = vec!["code".to_string(), "token".to_string()],
        |_| {},
    )
    .await;
    env.storage.create_client(test_client()).await.unwrap();

    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "token"),
        ("scope", "openid"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        query_param(&response.location(), "error").as_deref(),
        Some("invalid_request")
    );
}

#[tokio::test]
async fn consent_page_approves_and_denies() {
    let env = test_env(|_| {}, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    // Walk to the approval page without skip_approval.
    let response = get(&env.app, &format!("/auth?{}", code_flow_query("openid"))).await;
    let connector_login = response.location_path();
    let response = get(&env.app, &connector_login).await;
    let callback = response.location_path();
    let response = get(&env.app, &callback).await;
    let approval = response.location_path();

    let response = get(&env.app, &approval).await;
    assert_eq!(response.status, StatusCode::OK);
    let page = response.text();
    assert!(page.contains("Test App"));
    assert!(page.contains("Grant access"));

    // Deny: redirected back with access_denied.
    let req = query_param(&approval, "req").unwrap();
    let response = post_form(
        &env.app,
        &approval,
        &[("req", req.as_str()), ("approval", "reject")],
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location();
    assert!(location.starts_with(REDIRECT_URI));
    assert_eq!(
        query_param(&location, "error").as_deref(),
        Some("access_denied")
    );

    // Denial retired nothing: approving afterwards still works.
    let response = post_form(
        &env.app,
        &approval,
        &[("req", req.as_str()), ("approval", "approve")],
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(query_param(&response.location(), "code").is_some());
}

#[tokio::test]
async fn oob_renders_code_in_page() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage
        .create_client(portico_model::Client {
            id: "cli".to_string(),
            secret: "cli-secret".to_string(),
            public: true,
            ..portico_model::Client::default()
        })
        .await
        .unwrap();

    let query = auth_query(&[
        ("client_id", "cli"),
        ("response_type", "code"),
        ("scope", "openid"),
        ("redirect_uri", "urn:ietf:wg:oauth:2.0:oob"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    let connector_login = response.location_path();
    let response = get(&env.app, &connector_login).await;
    let callback = response.location_path();
    let response = get(&env.app, &callback).await;
    let approval = response.location_path();

    let response = get(&env.app, &approval).await;
    assert_eq!(response.status, StatusCode::OK);
    let page = response.text();
    let code = page
        .split("<pre>")
        .nth(1)
        .and_then(|rest| rest.split("</pre>").next())
        .expect("code rendered in page")
        .trim()
        .to_string();

    let response = post_form(
        &env.app,
        "/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "urn:ietf:wg:oauth:2.0:oob"),
        ],
        Some(("cli", "cli-secret")),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
}

#[tokio::test]
async fn force_approval_prompt_overrides_skip() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let query = auth_query(&[
        ("client_id", "test-app"),
        ("response_type", "code"),
        ("scope", "openid"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
        ("approval_prompt", "force"),
    ]);
    let response = get(&env.app, &format!("/auth?{query}")).await;
    let connector_login = response.location_path();
    let response = get(&env.app, &connector_login).await;
    let callback = response.location_path();
    let response = get(&env.app, &callback).await;
    let approval = response.location_path();

    // skip_approval is on, but the client asked for the consent page.
    let response = get(&env.app, &approval).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains("Grant access"));

    let req = query_param(&approval, "req").unwrap();
    let response = post_form(
        &env.app,
        &approval,
        &[("req", req.as_str()), ("approval", "approve")],
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(query_param(&response.location(), "code").is_some());
}

#[tokio::test]
async fn callback_without_state_is_a_session_error() {
    let env = test_env(|_| {}, |_| {}).await;
    let response = get(&env.app, "/callback?code=upstream").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = get(&env.app, "/callback?state=unknown").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approval_on_expired_request_fails() {
    let env = test_env(|c| c.skip_approval = true, |_| {}).await;
    env.storage.create_client(test_client()).await.unwrap();

    let response = get(&env.app, &format!("/auth?{}", code_flow_query("openid"))).await;
    let connector_login = response.location_path();
    let req = query_param(&connector_login, "req").unwrap();
    let response = get(&env.app, &connector_login).await;
    let callback = relative(&response.location());
    let response = get(&env.app, &callback).await;
    let approval = response.location_path();

    // Expire the request under the approval handler.
    env.storage
        .update_auth_request(&req, &mut |mut a| {
            a.expiry = Utc::now() - Duration::minutes(1);
            Ok(a)
        })
        .await
        .unwrap();

    let response = get(&env.app, &approval).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("expired"));
}
