//! Tower Layer for bearer token validation

use std::sync::Arc;
use tower::Layer;

use crate::jwt::BearerValidator;

use super::service::BearerAuthService;

/// Tower Layer that puts a [`BearerValidator`] in front of a service
#[derive(Debug, Clone)]
pub struct BearerAuthLayer {
    validator: Arc<BearerValidator>,
}

impl BearerAuthLayer {
    pub fn new(validator: BearerValidator) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }

    /// Share an existing validator
    pub fn from_arc(validator: Arc<BearerValidator>) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &BearerValidator {
        &self.validator
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService::new(inner, Arc::clone(&self.validator))
    }
}
