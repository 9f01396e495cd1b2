//! # Authorization Server Discovery
//!
//! Fetches the OpenID Connect discovery document and, for parties that verify
//! tokens, the JWKS it points to. The result is held as an immutable
//! [`ProviderSnapshot`] inside a [`MetadataCache`].
//!
//! ## Lifecycle
//!
//! - Loaded once at startup with [`MetadataCache::refresh`]; a failure there
//!   is fatal to the process.
//! - No timer-based expiry. Calling `refresh` again replaces the snapshot
//!   atomically.
//! - Components that start lazily use [`MetadataCache::get_or_refresh`].
//!
//! ## Consumed fields
//!
//! `issuer`, `authorization_endpoint`, `token_endpoint`,
//! `end_session_endpoint` (optional) and `jwks_uri`.

mod cache;
mod types;

pub use cache::MetadataCache;
pub use types::{DiscoveryError, ProviderMetadata, ProviderSnapshot};
