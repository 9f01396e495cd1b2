//! # Tower middleware for bearer token protection
//!
//! - [`BearerAuthLayer`] - wraps a service so every request must carry a
//!   valid access token
//! - [`BearerAuthService`] - validates the `Authorization` header and
//!   forwards or rejects
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use trustline_auth::tower::BearerAuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(BearerAuthLayer::new(validator))
//!     .service(my_inner_service);
//! ```
//!
//! ## Request Extensions
//!
//! On success the [`ValidatedToken`](crate::jwt::ValidatedToken) is inserted
//! into the request's extensions:
//!
//! ```rust,ignore
//! if let Some(token) = req.extensions().get::<ValidatedToken>() {
//!     println!("caller: {:?}", token.claims.registered.sub);
//! }
//! ```
//!
//! Rejected requests never reach the inner service. They get a plain-text
//! response carrying the error message, the status from
//! [`ValidationError::status_code`](crate::jwt::ValidationError::status_code)
//! and a `WWW-Authenticate: Bearer` challenge.

mod layer;
mod service;

pub use layer::BearerAuthLayer;
pub use service::{BearerAuthService, BearerAuthServiceFuture};
