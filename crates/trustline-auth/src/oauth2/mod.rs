//! OAuth2 / OpenID Connect client flows
//!
//! - [`AuthorizationCodeFlow`] - relying party login with PKCE, a signed
//!   request object and ID token verification, plus RP-initiated logout
//! - [`ClientCredentialsClient`] - machine-to-machine access tokens
//!
//! Both authenticate to the token endpoint with a freshly minted
//! `private_key_jwt` client assertion per call.

pub mod authorization_code;
pub mod client_credentials;
pub mod token;

pub use authorization_code::{
    AuthenticatedSession, AuthorizationCodeFlow, CallbackParams, LoginRedirect,
    PendingAuthorization,
};
pub use client_credentials::ClientCredentialsClient;
pub use token::TokenResponse;

use http::StatusCode;
use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::jwt::{SigningError, ValidationError};
use crate::pkce::RandomError;

/// Client flow errors
///
/// [`status_code`](Self::status_code) gives the status a relying party should
/// answer the browser with.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Provider metadata could not be loaded
    #[error("provider metadata unavailable: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Client assertion or request object signing failed
    #[error("Failed to create client assertion token: {0}")]
    Signing(#[from] SigningError),

    /// State, nonce or verifier generation failed
    #[error(transparent)]
    Random(#[from] RandomError),

    /// Callback `state` differs from the stored value
    #[error("Invalid state parameter")]
    StateMismatch,

    /// The provider redirected back with an error instead of a code
    #[error("authorization failed: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    /// Callback carried neither a code nor an error
    #[error("Missing authorization code")]
    MissingCode,

    /// The token endpoint rejected the request
    #[error("token endpoint returned {status}: {detail}")]
    TokenEndpoint { status: u16, detail: String },

    /// The token endpoint answered with something that is not a token response
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// A request to the provider could not be completed
    #[error("request to the authorization server failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The token response has no `id_token`
    #[error("No id_token field in oauth2 token.")]
    MissingIdToken,

    /// The ID token failed verification
    #[error("Failed to verify ID Token: {0}")]
    IdTokenVerification(#[source] ValidationError),

    /// The ID token `nonce` differs from the stored value
    #[error("Invalid nonce")]
    NonceMismatch,

    /// The provider advertises no `end_session_endpoint`
    #[error("provider does not support RP-initiated logout")]
    EndSessionUnsupported,

    /// An endpoint from the discovery document is not a valid URL
    #[error("invalid endpoint URL {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl FlowError {
    /// HTTP status for a relying party response
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::StateMismatch | Self::NonceMismatch | Self::MissingCode => StatusCode::BAD_REQUEST,
            Self::AuthorizationDenied { .. } | Self::TokenEndpoint { .. } => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
