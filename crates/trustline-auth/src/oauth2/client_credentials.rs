//! Client Credentials flow for machine clients

use tracing::info;

use super::FlowError;
use super::token::{TokenResponse, request_token};
use crate::assertion::{self, CLIENT_ASSERTION_TYPE};
use crate::context::ProviderContext;

/// Obtains access tokens for the client itself
///
/// Metadata is loaded lazily on the first request. Every call mints its own
/// client assertion.
#[derive(Debug, Clone)]
pub struct ClientCredentialsClient {
    context: ProviderContext,
    client_id: String,
    scopes: Vec<String>,
}

impl ClientCredentialsClient {
    /// Create a client requesting `scopes`
    pub fn new<I, S>(context: ProviderContext, client_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            context,
            client_id: client_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Request an access token
    ///
    /// # Errors
    ///
    /// Fails on metadata, signing, transport or token endpoint errors. No
    /// retry is attempted.
    pub async fn request_token(&self) -> Result<TokenResponse, FlowError> {
        let snapshot = self.context.metadata().get_or_refresh().await?;
        let token_endpoint = &snapshot.metadata.token_endpoint;
        let client_assertion =
            assertion::mint(self.context.signer(), &self.client_id, token_endpoint)?;
        let scope = self.scopes.join(" ");

        let response = request_token(
            self.context.http_client(),
            token_endpoint,
            &[
                ("grant_type", "client_credentials"),
                ("scope", &scope),
                ("client_id", &self.client_id),
                ("client_assertion", &client_assertion),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ],
        )
        .await?;

        info!(
            client_id = %self.client_id,
            expires_in = ?response.expires_in,
            "Access token obtained"
        );
        Ok(response)
    }
}
