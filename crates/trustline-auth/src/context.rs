//! Provider context passed to the client-side flows
//!
//! Bundles what the relying party and the machine client share: the metadata
//! cache, the signer holding the client's private key and the HTTP client
//! used for token endpoint calls. Built once at startup and cloned cheaply
//! into each flow.

use std::sync::Arc;
use std::time::Duration;

use crate::discovery::MetadataCache;
use crate::jwt::JwtSigner;

/// Build the HTTP client used for all calls to the authorization server
///
/// Requests time out after `timeout` and redirects are never followed.
///
/// # Errors
///
/// Returns the reqwest error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("trustline/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// Shared dependencies of the client-side flows
#[derive(Debug, Clone)]
pub struct ProviderContext {
    metadata: Arc<MetadataCache>,
    signer: Arc<JwtSigner>,
    http_client: reqwest::Client,
}

impl ProviderContext {
    /// Create a context from its parts
    pub fn new(
        metadata: Arc<MetadataCache>,
        signer: Arc<JwtSigner>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            metadata,
            signer,
            http_client,
        }
    }

    /// Discovery metadata and keys
    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// Client assertion and request object signer
    pub fn signer(&self) -> &JwtSigner {
        &self.signer
    }

    /// HTTP client for token endpoint calls
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}
