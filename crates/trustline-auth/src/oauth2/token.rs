//! Token endpoint requests and responses

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::FlowError;

/// Successful token endpoint response (RFC 6749 §5.1 plus `id_token`)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Error response (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// POST a form-encoded token request
///
/// No retry: a failure surfaces immediately.
pub(crate) async fn request_token(
    http_client: &reqwest::Client,
    token_endpoint: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, FlowError> {
    debug!(token_endpoint, "Requesting token");

    let response = http_client
        .post(token_endpoint)
        .header(http::header::ACCEPT, "application/json")
        .form(form)
        .send()
        .await
        .map_err(FlowError::Transport)?;

    let status = response.status();
    let body = response.bytes().await.map_err(FlowError::Transport)?;

    if !status.is_success() {
        let detail = match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                error,
                error_description: Some(description),
            }) => format!("{error}: {description}"),
            Ok(ErrorResponse { error, .. }) => error,
            Err(_) => String::from_utf8_lossy(&body).into_owned(),
        };
        warn!(token_endpoint, status = %status, detail = %detail, "Token endpoint rejected request");
        return Err(FlowError::TokenEndpoint {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_slice(&body).map_err(|e| FlowError::InvalidTokenResponse(e.to_string()))
}
