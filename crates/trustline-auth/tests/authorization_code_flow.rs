//! Relying party login against a mocked provider
//!
//! Drives `begin` and `complete` end to end and inspects what reached the
//! token endpoint.

mod common;

use std::collections::HashMap;

use common::{CLIENT_PUBLIC_JWK, MockProvider, ROGUE_PRIVATE_JWK, form_fields, sign_with};
use http::StatusCode;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use trustline_auth::assertion::CLIENT_ASSERTION_TYPE;
use trustline_auth::jwt::RequestObjectClaims;
use trustline_auth::oauth2::{CallbackParams, PendingAuthorization};
use trustline_auth::{AuthorizationCodeFlow, ClientConfig, FlowError};

const CLIENT_ID: &str = "helseid-sample-web";
const REDIRECT_URI: &str = "http://localhost:44123/callback";

fn flow(provider: &MockProvider) -> AuthorizationCodeFlow {
    AuthorizationCodeFlow::new(
        provider.client_context(true),
        ClientConfig::new(CLIENT_ID, REDIRECT_URI)
            .with_scopes(["openid", "profile", "helseid://scopes/identity/pid"])
            .with_post_logout_redirect_uri("http://localhost:44123/"),
    )
}

fn callback(pending: &PendingAuthorization) -> CallbackParams {
    CallbackParams {
        code: Some("auth-code-123".into()),
        state: Some(pending.anti_forgery.state.clone()),
        ..Default::default()
    }
}

fn verify_client_jwt<T: serde::de::DeserializeOwned>(token: &str, audience: &str) -> T {
    let jwk: Jwk = serde_json::from_str(CLIENT_PUBLIC_JWK).unwrap();
    let mut validation = Validation::new(Algorithm::PS256);
    validation.set_audience(&[audience]);
    decode::<T>(token, &DecodingKey::from_jwk(&jwk).unwrap(), &validation)
        .unwrap()
        .claims
}

#[tokio::test]
async fn test_login_round_trip() {
    // GIVEN: a provider and a login that has been started
    let provider = MockProvider::start_with_metadata().await;
    let flow = flow(&provider);
    let redirect = flow.begin().await.unwrap();
    let pending = redirect.pending.clone();

    let id_token = provider.sign(&provider.id_token_claims(CLIENT_ID, &pending.anti_forgery.nonce));
    provider
        .mock_token(json!({
            "access_token": "access-token-xyz",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": id_token,
        }))
        .await;

    // WHEN: the provider calls back with the matching state
    let session = flow.complete(pending.clone(), &callback(&pending)).await.unwrap();

    // THEN: the session holds both tokens and the verified claims
    assert_eq!(session.access_token, "access-token-xyz");
    assert_eq!(session.id_token, id_token);
    assert_eq!(session.claims["name"], "Test User");
    assert_eq!(session.claims["nonce"], Value::String(pending.anti_forgery.nonce.clone()));

    // AND: the token request carried the verifier and a fresh client assertion
    let requests = provider.server.received_requests().await.unwrap();
    let token_request = requests
        .iter()
        .find(|r| r.url.path() == "/connect/token")
        .unwrap();
    let form = form_fields(&token_request.body);
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "auth-code-123");
    assert_eq!(form["redirect_uri"], REDIRECT_URI);
    assert_eq!(form["code_verifier"], pending.pkce.code_verifier);
    assert_eq!(form["client_id"], CLIENT_ID);
    assert_eq!(form["client_assertion_type"], CLIENT_ASSERTION_TYPE);

    let assertion: Value = verify_client_jwt(&form["client_assertion"], &provider.token_endpoint);
    assert_eq!(assertion["iss"], CLIENT_ID);
    assert_eq!(assertion["sub"], CLIENT_ID);
}

#[tokio::test]
async fn test_authorization_url_carries_signed_request_object() {
    let provider = MockProvider::start_with_metadata().await;
    let redirect = flow(&provider).begin().await.unwrap();

    let query: HashMap<String, String> =
        redirect.authorization_url.query_pairs().into_owned().collect();
    assert!(
        redirect
            .authorization_url
            .as_str()
            .starts_with(&provider.authorization_endpoint)
    );

    let request: RequestObjectClaims = verify_client_jwt(&query["request"], &provider.issuer);
    assert_eq!(request.client_id, CLIENT_ID);
    assert_eq!(request.iss, CLIENT_ID);
    assert_eq!(request.response_type, "code");
    assert_eq!(request.redirect_uri, REDIRECT_URI);
    assert_eq!(request.scope, "openid profile helseid://scopes/identity/pid");
    assert_eq!(request.state, query["state"]);
    assert_eq!(request.nonce, query["nonce"]);
    assert_eq!(request.code_challenge, query["code_challenge"]);
    assert_eq!(request.code_challenge_method, "S256");
    assert_eq!(request.exp - request.nbf, 60);
}

#[tokio::test]
async fn test_state_mismatch_never_reaches_token_endpoint() {
    // GIVEN: a started login
    let provider = MockProvider::start_with_metadata().await;
    let flow = flow(&provider);
    let pending = flow.begin().await.unwrap().pending;
    provider.mock_token(json!({"access_token": "x", "token_type": "Bearer"})).await;

    // WHEN: the callback state has been tampered with
    let params = CallbackParams {
        code: Some("auth-code-123".into()),
        state: Some("attacker-state".into()),
        ..Default::default()
    };
    let err = flow.complete(pending, &params).await.unwrap_err();

    // THEN: 400 and no exchange attempted
    assert!(matches!(err, FlowError::StateMismatch));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Invalid state parameter");
    let requests = provider.server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/connect/token"));
}

#[tokio::test]
async fn test_nonce_mismatch_is_a_hard_failure() {
    let provider = MockProvider::start_with_metadata().await;
    let flow = flow(&provider);
    let pending = flow.begin().await.unwrap().pending;

    let id_token = provider.sign(&provider.id_token_claims(CLIENT_ID, "some-other-nonce"));
    provider
        .mock_token(json!({
            "access_token": "access-token-xyz",
            "token_type": "Bearer",
            "id_token": id_token,
        }))
        .await;

    let err = flow.complete(pending.clone(), &callback(&pending)).await.unwrap_err();
    assert!(matches!(err, FlowError::NonceMismatch));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_id_token() {
    let provider = MockProvider::start_with_metadata().await;
    let flow = flow(&provider);
    let pending = flow.begin().await.unwrap().pending;
    provider
        .mock_token(json!({"access_token": "access-token-xyz", "token_type": "Bearer"}))
        .await;

    let err = flow.complete(pending.clone(), &callback(&pending)).await.unwrap_err();
    assert!(matches!(err, FlowError::MissingIdToken));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_forged_id_token_is_rejected() {
    let provider = MockProvider::start_with_metadata().await;
    let flow = flow(&provider);
    let pending = flow.begin().await.unwrap().pending;

    let forged = sign_with(
        ROGUE_PRIVATE_JWK,
        &provider.id_token_claims(CLIENT_ID, &pending.anti_forgery.nonce),
    );
    provider
        .mock_token(json!({
            "access_token": "access-token-xyz",
            "token_type": "Bearer",
            "id_token": forged,
        }))
        .await;

    let err = flow.complete(pending.clone(), &callback(&pending)).await.unwrap_err();
    assert!(matches!(err, FlowError::IdTokenVerification(_)));
    assert!(err.to_string().starts_with("Failed to verify ID Token"));
}

#[tokio::test]
async fn test_token_endpoint_error_is_unauthorized() {
    let provider = MockProvider::start_with_metadata().await;
    let flow = flow(&provider);
    let pending = flow.begin().await.unwrap().pending;
    provider
        .mock_token_error(400, "invalid_grant", "code expired")
        .await;

    let err = flow.complete(pending.clone(), &callback(&pending)).await.unwrap_err();
    match &err {
        FlowError::TokenEndpoint { status, detail } => {
            assert_eq!(*status, 400);
            assert_eq!(detail, "invalid_grant: code expired");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_end_session_url_from_discovery() {
    let provider = MockProvider::start_with_metadata().await;
    let url = flow(&provider)
        .end_session_url(Some("the-id-token"), None)
        .await
        .unwrap();

    assert!(url.as_str().starts_with(&provider.end_session_endpoint));
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(query["id_token_hint"], "the-id-token");
    assert_eq!(query["post_logout_redirect_uri"], "http://localhost:44123/");
}
