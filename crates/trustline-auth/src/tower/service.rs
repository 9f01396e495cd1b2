//! Tower Service for bearer token validation

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, Request, Response};
use tower_service::Service;
use tracing::{debug, warn};

use crate::jwt::{BearerValidator, ValidationError};

/// Future returned by [`BearerAuthService`]
pub type BearerAuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Validates the bearer token before calling the inner service
///
/// Rejections are answered directly, so the error type is the inner
/// service's own.
#[derive(Debug, Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    validator: Arc<BearerValidator>,
}

impl<S> BearerAuthService<S> {
    pub fn new(inner: S, validator: Arc<BearerValidator>) -> Self {
        Self { inner, validator }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S, B, ResBody> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: From<String>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BearerAuthServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let validator = Arc::clone(&self.validator);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match validator.validate(req.headers()).await {
                Ok(token) => {
                    debug!(
                        sub = token.claims.registered.sub.as_deref().unwrap_or("<none>"),
                        path = %req.uri().path(),
                        "Bearer token accepted"
                    );
                    req.extensions_mut().insert(token);
                    inner.call(req).await
                }
                Err(e) => {
                    warn!(path = %req.uri().path(), error = %e, "Bearer token rejected");
                    Ok(rejection(&e))
                }
            }
        })
    }
}

fn rejection<ResBody: From<String>>(error: &ValidationError) -> Response<ResBody> {
    let mut response = Response::new(ResBody::from(error.to_string()));
    *response.status_mut() = error.status_code();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
