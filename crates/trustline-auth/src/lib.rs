//! # Trustline Auth - OpenID Connect Trust Triangle Core
//!
//! Protocol logic shared by the three parties of an OpenID Connect deployment
//! that authenticates clients with asymmetric keys instead of shared secrets:
//!
//! - a **resource server** validating inbound bearer access tokens,
//! - a **relying party** running the Authorization Code flow with PKCE and a
//!   signed request object (JAR),
//! - a **machine client** running the Client Credentials flow.
//!
//! All token endpoint calls authenticate with `private_key_jwt` client
//! assertions signed PS256.
//!
//! ## Architecture
//!
//! - [`discovery`] - Discovery document + JWKS snapshot with atomic refresh
//! - [`pkce`] - Random strings, PKCE pairs, state and nonce
//! - [`jwt`] - Claim types, PS256 signer, key set and token verification
//! - [`assertion`] - Client assertion minting (`private_key_jwt`)
//! - [`request_object`] - Signed authorization request objects (JAR)
//! - [`oauth2`] - Authorization Code and Client Credentials orchestration
//! - [`context`] - Dependency-injected provider context
//! - `tower` - Bearer token middleware (feature `middleware`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trustline_auth::discovery::MetadataCache;
//! use trustline_auth::jwt::BearerValidator;
//!
//! # tokio_test::block_on(async {
//! let http = trustline_auth::context::http_client(std::time::Duration::from_secs(10))?;
//! let metadata = Arc::new(
//!     MetadataCache::new("https://idp.example.com/.well-known/openid-configuration", http)
//!         .with_jwks(true),
//! );
//! metadata.refresh().await?;
//!
//! let validator = BearerValidator::new(Arc::clone(&metadata), "sample-api")
//!     .require_scope("sample-api/foo");
//!
//! let mut headers = http::HeaderMap::new();
//! headers.insert(http::header::AUTHORIZATION, "Bearer eyJ...".parse()?);
//! let token = validator.validate(&headers).await?;
//! println!("caller: {:?}", token.claims.registered.sub);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assertion;
pub mod config;
pub mod context;
pub mod discovery;
pub mod jwt;
pub mod oauth2;
pub mod pkce;
pub mod request_object;

#[cfg(feature = "middleware")]
#[cfg_attr(docsrs, doc(cfg(feature = "middleware")))]
pub mod tower;

pub use config::{ClientConfig, ResourceServerConfig};
pub use context::ProviderContext;
pub use discovery::{DiscoveryError, MetadataCache, ProviderMetadata, ProviderSnapshot};
pub use jwt::{
    BearerValidator, IdTokenVerifier, JwtSigner, KeySet, SigningError, ValidatedToken,
    ValidationError,
};
pub use oauth2::{AuthorizationCodeFlow, ClientCredentialsClient, FlowError, TokenResponse};
pub use pkce::{AntiForgeryState, PkcePair, RandomError, random_string};
