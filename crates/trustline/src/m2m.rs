//! Machine client
//!
//! Obtains an access token with the Client Credentials grant and calls the
//! protected resource once, printing the outcome.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;
use trustline_auth::{ClientCredentialsClient, MetadataCache, ProviderContext, context};

use crate::config::AppConfig;

/// Status line and body of the resource call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub status: reqwest::StatusCode,
    pub body: String,
}

impl ResourceResponse {
    /// Print the report shown to the user
    ///
    /// # Errors
    ///
    /// Fails if `out` cannot be written.
    pub fn report(&self, mut out: impl Write) -> std::io::Result<()> {
        writeln!(out, "Response")?;
        writeln!(out, "Status: {}", self.status)?;
        writeln!(out, "Body: {}", self.body)
    }
}

/// Fetch a token and call `resource_endpoint` with it
///
/// # Errors
///
/// Fails if no token can be obtained or the resource cannot be reached.
pub async fn call_resource(
    client: &ClientCredentialsClient,
    http: &reqwest::Client,
    resource_endpoint: &str,
) -> anyhow::Result<ResourceResponse> {
    let token = client
        .request_token()
        .await
        .context("Failed to obtain an access token")?;

    let response = http
        .get(resource_endpoint)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .with_context(|| format!("Request to {resource_endpoint} failed"))?;

    let status = response.status();
    info!(resource_endpoint, status = %status, "Resource responded");
    Ok(ResourceResponse {
        status,
        body: response.text().await?,
    })
}

/// Run the machine client once
///
/// # Errors
///
/// Fails on configuration, token or transport errors.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let settings = config.m2m()?;
    let signer = settings.key.load("m2m")?;
    let http = context::http_client(config.provider.timeout())?;

    // Discovery only, no JWKS
    let metadata = Arc::new(MetadataCache::new(&config.provider.discovery_url, http.clone()));
    let client = ClientCredentialsClient::new(
        ProviderContext::new(metadata, Arc::new(signer), http.clone()),
        &settings.client_id,
        settings.scopes.iter().cloned(),
    );

    let response = call_resource(&client, &http, &settings.resource_endpoint).await?;
    response.report(std::io::stdout().lock())?;
    Ok(())
}
