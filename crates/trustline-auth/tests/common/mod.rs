//! Common test utilities for integration tests
//!
//! A wiremock identity provider serving discovery, JWKS and token endpoints,
//! plus helpers that sign tokens with the fixture keys.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use trustline_auth::{JwtSigner, MetadataCache, ProviderContext};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const CLIENT_PRIVATE_JWK: &str = include_str!("../fixtures/client_private_jwk.json");
pub const CLIENT_PUBLIC_JWK: &str = include_str!("../fixtures/client_public_jwk.json");
pub const PROVIDER_PRIVATE_JWK: &str = include_str!("../fixtures/provider_private_jwk.json");
pub const PROVIDER_PUBLIC_JWK: &str = include_str!("../fixtures/provider_public_jwk.json");
pub const ROGUE_PRIVATE_JWK: &str = include_str!("../fixtures/rogue_private_jwk.json");

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Mock OpenID Connect provider
pub struct MockProvider {
    pub server: MockServer,
    pub issuer: String,
    pub discovery_url: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub end_session_endpoint: String,
    pub jwks_uri: String,
}

impl MockProvider {
    /// Start a provider with no mounted endpoints
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let issuer = server.uri();

        Self {
            discovery_url: format!("{issuer}{DISCOVERY_PATH}"),
            authorization_endpoint: format!("{issuer}/connect/authorize"),
            token_endpoint: format!("{issuer}/connect/token"),
            end_session_endpoint: format!("{issuer}/connect/endsession"),
            jwks_uri: format!("{issuer}/.well-known/openid-configuration/jwks"),
            issuer,
            server,
        }
    }

    /// Start a provider serving discovery and its signing key
    pub async fn start_with_metadata() -> Self {
        let provider = Self::start().await;
        provider.mock_discovery().await;
        provider.mock_jwks(vec![public_jwk(PROVIDER_PUBLIC_JWK)]).await;
        provider
    }

    pub fn discovery_document(&self) -> Value {
        json!({
            "issuer": self.issuer,
            "authorization_endpoint": self.authorization_endpoint,
            "token_endpoint": self.token_endpoint,
            "end_session_endpoint": self.end_session_endpoint,
            "jwks_uri": self.jwks_uri,
            "response_types_supported": ["code"],
            "token_endpoint_auth_methods_supported": ["private_key_jwt"]
        })
    }

    pub async fn mock_discovery(&self) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_document()))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_jwks(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint answering every POST with `body`
    pub async fn mock_token(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_error(&self, status: u16, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    /// Metadata cache pointed at this provider, not yet loaded
    pub fn metadata_cache(&self, load_keys: bool) -> Arc<MetadataCache> {
        Arc::new(MetadataCache::new(&self.discovery_url, http_client()).with_jwks(load_keys))
    }

    /// Client context signing with the client fixture key
    pub fn client_context(&self, load_keys: bool) -> ProviderContext {
        ProviderContext::new(
            self.metadata_cache(load_keys),
            Arc::new(client_signer()),
            http_client(),
        )
    }

    /// Sign `claims` with the provider's key
    pub fn sign(&self, claims: &Value) -> String {
        sign_with(PROVIDER_PRIVATE_JWK, claims)
    }

    /// Access token claims valid for `audience` right now
    pub fn access_token_claims(&self, audience: &str, scope: Value) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": self.issuer,
            "aud": audience,
            "sub": "user-1",
            "client_id": "m2m-client",
            "iat": now - 5,
            "nbf": now - 5,
            "exp": now + 300,
            "scope": scope
        })
    }

    /// ID token claims for `client_id` carrying `nonce`
    pub fn id_token_claims(&self, client_id: &str, nonce: &str) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": self.issuer,
            "aud": client_id,
            "sub": "user-1",
            "name": "Test User",
            "iat": now - 5,
            "nbf": now - 5,
            "exp": now + 300,
            "nonce": nonce
        })
    }
}

pub fn http_client() -> reqwest::Client {
    trustline_auth::context::http_client(Duration::from_secs(5)).unwrap()
}

pub fn client_signer() -> JwtSigner {
    JwtSigner::from_jwk_json(CLIENT_PRIVATE_JWK).unwrap()
}

pub fn public_jwk(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

pub fn sign_with(private_jwk: &str, claims: &Value) -> String {
    JwtSigner::from_jwk_json(private_jwk)
        .unwrap()
        .sign(claims)
        .unwrap()
}

/// Decode a form-encoded request body
pub fn form_fields(body: &[u8]) -> std::collections::HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}
