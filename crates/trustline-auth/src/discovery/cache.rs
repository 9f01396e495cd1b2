//! Metadata cache with atomic snapshot swap

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::types::{DiscoveryError, ProviderMetadata, ProviderSnapshot};
use crate::jwt::KeySet;

/// Cache of the provider's discovery document and (optionally) its JWKS
///
/// Nothing is fetched on a timer. [`refresh`](Self::refresh) performs the
/// fetches and publishes a complete [`ProviderSnapshot`]; concurrent readers
/// keep the `Arc` they already hold and never observe a partial update.
///
/// # Example
///
/// ```rust,no_run
/// # use trustline_auth::discovery::MetadataCache;
/// # tokio_test::block_on(async {
/// let http = trustline_auth::context::http_client(std::time::Duration::from_secs(10))?;
/// let cache = MetadataCache::new(
///     "https://idp.example.com/.well-known/openid-configuration",
///     http,
/// )
/// .with_jwks(true);
///
/// let snapshot = cache.refresh().await?;
/// println!("token endpoint: {}", snapshot.metadata.token_endpoint);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct MetadataCache {
    /// Discovery document URL
    discovery_url: String,
    /// HTTP client (timeout, no redirects)
    http_client: reqwest::Client,
    /// Whether refresh also loads the JWKS
    load_keys: bool,
    /// Current snapshot
    current: RwLock<Option<Arc<ProviderSnapshot>>>,
}

impl MetadataCache {
    /// Create an empty cache for `discovery_url`
    pub fn new(discovery_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            http_client,
            load_keys: false,
            current: RwLock::new(None),
        }
    }

    /// Also fetch the JWKS on refresh (resource server and relying party)
    #[must_use]
    pub fn with_jwks(mut self, load_keys: bool) -> Self {
        self.load_keys = load_keys;
        self
    }

    /// Create a cache that already holds `snapshot`
    ///
    /// A later [`refresh`](Self::refresh) still fetches from `discovery_url`.
    pub fn from_snapshot(
        discovery_url: impl Into<String>,
        http_client: reqwest::Client,
        snapshot: ProviderSnapshot,
    ) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            http_client,
            load_keys: true,
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// Discovery document URL
    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    /// Last successfully loaded snapshot
    pub async fn get(&self) -> Option<Arc<ProviderSnapshot>> {
        self.current.read().await.clone()
    }

    /// Current snapshot, refreshing first if none has been loaded yet
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the lazy refresh fails.
    pub async fn get_or_refresh(&self) -> Result<Arc<ProviderSnapshot>, DiscoveryError> {
        if let Some(snapshot) = self.get().await {
            return Ok(snapshot);
        }
        debug!(discovery_url = %self.discovery_url, "No provider metadata cached, refreshing");
        self.refresh().await
    }

    /// Fetch the discovery document (and JWKS when enabled) and publish the
    /// result as the new snapshot
    ///
    /// On error the previous snapshot, if any, stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if either fetch fails or either document
    /// does not decode.
    pub async fn refresh(&self) -> Result<Arc<ProviderSnapshot>, DiscoveryError> {
        info!(discovery_url = %self.discovery_url, "Fetching provider metadata");

        let body = self.fetch(&self.discovery_url).await?;
        let metadata: ProviderMetadata =
            serde_json::from_slice(&body).map_err(|source| {
                error!(discovery_url = %self.discovery_url, error = %source, "Failed to parse discovery document");
                DiscoveryError::InvalidDocument {
                    url: self.discovery_url.clone(),
                    source,
                }
            })?;

        let keys = if self.load_keys {
            info!(jwks_uri = %metadata.jwks_uri, "Fetching JWKS from endpoint");
            let body = self.fetch(&metadata.jwks_uri).await?;
            let keys = KeySet::from_slice(&body).map_err(|source| {
                error!(jwks_uri = %metadata.jwks_uri, error = %source, "Failed to parse JWKS JSON");
                DiscoveryError::InvalidDocument {
                    url: metadata.jwks_uri.clone(),
                    source,
                }
            })?;
            if keys.skipped() > 0 {
                warn!(
                    jwks_uri = %metadata.jwks_uri,
                    skipped = keys.skipped(),
                    "Some JWKS entries were skipped"
                );
            }
            keys
        } else {
            KeySet::default()
        };

        info!(
            issuer = %metadata.issuer,
            key_count = keys.len(),
            "Provider metadata refreshed"
        );

        let snapshot = Arc::new(ProviderSnapshot::new(metadata, keys));
        *self.current.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DiscoveryError> {
        let response = self.http_client.get(url).send().await.map_err(|source| {
            error!(url, error = %source, "Request to authorization server failed");
            DiscoveryError::Http {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(url, status = %status, "Authorization server returned error status");
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| DiscoveryError::Http {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(issuer: &str) -> ProviderSnapshot {
        ProviderSnapshot::new(
            ProviderMetadata {
                issuer: issuer.to_string(),
                authorization_endpoint: format!("{issuer}/authorize"),
                token_endpoint: format!("{issuer}/token"),
                end_session_endpoint: None,
                jwks_uri: format!("{issuer}/jwks"),
            },
            KeySet::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_cache_returns_none() {
        let cache = MetadataCache::new("http://localhost:1/discovery", reqwest::Client::new());
        assert!(cache.get().await.is_none());
        assert_eq!(cache.discovery_url(), "http://localhost:1/discovery");
    }

    #[tokio::test]
    async fn test_from_snapshot_is_served_without_network() {
        let cache = MetadataCache::from_snapshot(
            "http://localhost:1/discovery",
            reqwest::Client::new(),
            snapshot("https://idp.example.com"),
        );

        let first = cache.get_or_refresh().await.unwrap();
        let second = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.metadata.issuer, "https://idp.example.com");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let cache = MetadataCache::from_snapshot(
            "http://127.0.0.1:9/unreachable",
            reqwest::Client::new(),
            snapshot("https://idp.example.com"),
        );

        let err = cache.refresh().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Http { .. }));
        assert_eq!(
            cache.get().await.unwrap().metadata.issuer,
            "https://idp.example.com"
        );
    }
}
