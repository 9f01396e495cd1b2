//! Discovery document types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jwt::KeySet;

/// Discovery and JWKS fetch errors
///
/// All of these are bootstrap failures: without metadata the process cannot
/// serve correctly.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The HTTP request could not be completed
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body did not decode
    #[error("failed to parse response from {url}: {source}")]
    InvalidDocument {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The subset of the OpenID Connect discovery document this crate consumes
///
/// ```json
/// {
///   "issuer": "https://idp.example.com",
///   "authorization_endpoint": "https://idp.example.com/connect/authorize",
///   "token_endpoint": "https://idp.example.com/connect/token",
///   "end_session_endpoint": "https://idp.example.com/connect/endsession",
///   "jwks_uri": "https://idp.example.com/.well-known/openid-configuration/jwks"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Compared byte-for-byte with the `iss` claim of every token
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    pub jwks_uri: String,
}

/// One consistent view of the provider: metadata plus the keys fetched from
/// its `jwks_uri`
///
/// Snapshots are immutable. A refresh builds a new one and swaps it in whole.
#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub metadata: ProviderMetadata,
    /// Empty when the cache was configured not to load keys
    pub keys: KeySet,
}

impl ProviderSnapshot {
    /// Build a snapshot from already fetched parts
    pub fn new(metadata: ProviderMetadata, keys: KeySet) -> Self {
        Self { metadata, keys }
    }
}
