//! Resource server
//!
//! Loads provider metadata and keys once at startup and then serves
//! `GET /foo` to callers whose access token carries the configured scope.

use std::sync::Arc;

use anyhow::Context as _;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;
use tracing::info;
use trustline_auth::tower::BearerAuthLayer;
use trustline_auth::{BearerValidator, MetadataCache, ValidatedToken, context};

use crate::config::{ApiSettings, AppConfig};

/// Router with `/foo` behind bearer validation
pub fn router(validator: BearerValidator) -> Router {
    Router::new()
        .route("/foo", get(foo))
        .route_layer(BearerAuthLayer::new(validator))
        .layer(TraceLayer::new_for_http())
}

async fn foo(Extension(token): Extension<ValidatedToken>) -> String {
    let caller = token
        .claims
        .client_id
        .as_deref()
        .or(token.claims.registered.sub.as_deref())
        .unwrap_or("unknown caller");
    format!("Hello from the API, {caller}! Your token was valid and carried the required scope.")
}

/// Build the validator for `settings`, loading metadata and keys first
///
/// # Errors
///
/// A failed discovery or JWKS fetch is fatal: there is no serving without
/// keys.
pub async fn validator(config: &AppConfig, settings: &ApiSettings) -> anyhow::Result<BearerValidator> {
    let http = context::http_client(config.provider.timeout())?;
    let metadata = Arc::new(MetadataCache::new(&config.provider.discovery_url, http).with_jwks(true));
    metadata
        .refresh()
        .await
        .context("Failed to load provider metadata and keys")?;

    Ok(BearerValidator::from_config(metadata, &settings.resource))
}

/// Run the resource server until shutdown
///
/// # Errors
///
/// Fails on bootstrap errors or if the listener cannot bind.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let settings = config.api()?;
    let app = router(validator(config, settings).await?);

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    info!(addr = %settings.bind, audience = %settings.resource.audience, "Resource server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ISSUER, provider_snapshot, sign_provider_token};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;
    use tower::ServiceExt;

    const AUDIENCE: &str = "norsk-helsenett:golang-sample-api";
    const SCOPE: &str = "norsk-helsenett:golang-sample-api/foo";

    fn app() -> Router {
        let http = context::http_client(std::time::Duration::from_secs(1)).unwrap();
        let metadata = Arc::new(MetadataCache::from_snapshot(
            format!("{ISSUER}/.well-known/openid-configuration"),
            http,
            provider_snapshot(),
        ));
        router(BearerValidator::new(metadata, AUDIENCE).require_scope(SCOPE))
    }

    fn get_foo(authorization: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri("/foo");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_authorized_request() {
        let token = sign_provider_token(json!({
            "aud": AUDIENCE,
            "client_id": "m2m-client",
            "scope": [SCOPE]
        }));

        let response = app()
            .oneshot(get_foo(Some(format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("m2m-client"));
    }

    #[tokio::test]
    async fn test_wrong_scope_is_unauthorized() {
        let token = sign_provider_token(json!({"aud": AUDIENCE, "scope": ["openid"]}));

        let response = app()
            .oneshot(get_foo(Some(format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_text(response).await,
            "access token did not contain the required scope"
        );
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app().oneshot(get_foo(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/bar")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
