//! Fixtures shared by the unit tests

use chrono::Utc;
use serde_json::{Value, json};
use trustline_auth::jwt::KeySet;
use trustline_auth::{JwtSigner, ProviderMetadata, ProviderSnapshot};

pub const ISSUER: &str = "https://idp.example.com";

pub const CLIENT_PRIVATE_JWK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../trustline-auth/tests/fixtures/client_private_jwk.json"
));
pub const PROVIDER_PRIVATE_JWK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../trustline-auth/tests/fixtures/provider_private_jwk.json"
));
pub const PROVIDER_PUBLIC_JWK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../trustline-auth/tests/fixtures/provider_public_jwk.json"
));

/// Snapshot for a provider at `issuer` holding the provider fixture key
pub fn snapshot_for(issuer: &str) -> ProviderSnapshot {
    let keys = KeySet::from_slice(format!(r#"{{"keys":[{PROVIDER_PUBLIC_JWK}]}}"#).as_bytes())
        .unwrap();
    ProviderSnapshot::new(
        ProviderMetadata {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/connect/authorize"),
            token_endpoint: format!("{issuer}/connect/token"),
            end_session_endpoint: Some(format!("{issuer}/connect/endsession")),
            jwks_uri: format!("{issuer}/jwks"),
        },
        keys,
    )
}

pub fn provider_snapshot() -> ProviderSnapshot {
    snapshot_for(ISSUER)
}

/// Claims valid right now for `issuer`; `overrides` replaces fields
pub fn claims_for(issuer: &str, overrides: Value) -> Value {
    let now = Utc::now().timestamp();
    let mut claims = json!({
        "iss": issuer,
        "sub": "user-1",
        "iat": now - 5,
        "nbf": now - 5,
        "exp": now + 300,
    });
    if let (Some(base), Value::Object(extra)) = (claims.as_object_mut(), overrides) {
        base.extend(extra);
    }
    claims
}

pub fn sign_provider_claims(claims: &Value) -> String {
    JwtSigner::from_jwk_json(PROVIDER_PRIVATE_JWK)
        .unwrap()
        .sign(claims)
        .unwrap()
}

/// Token from the default issuer with `overrides` applied
pub fn sign_provider_token(overrides: Value) -> String {
    sign_provider_claims(&claims_for(ISSUER, overrides))
}

pub fn client_signer() -> JwtSigner {
    JwtSigner::from_jwk_json(CLIENT_PRIVATE_JWK).unwrap()
}
