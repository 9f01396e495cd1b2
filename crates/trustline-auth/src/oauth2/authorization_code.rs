//! Authorization Code flow with PKCE and a signed request object
//!
//! One login attempt moves through
//! `begin -> (browser at the provider) -> complete`. [`begin`] returns the
//! redirect URL plus the [`PendingAuthorization`] the caller must keep in the
//! user's session; [`complete`] consumes it, so state, nonce and verifier are
//! single use.
//!
//! [`begin`]: AuthorizationCodeFlow::begin
//! [`complete`]: AuthorizationCodeFlow::complete

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::FlowError;
use super::token::{TokenResponse, request_token};
use crate::assertion::{self, CLIENT_ASSERTION_TYPE};
use crate::config::ClientConfig;
use crate::context::ProviderContext;
use crate::jwt::IdTokenVerifier;
use crate::pkce::{AntiForgeryState, CODE_CHALLENGE_METHOD, PkcePair};
use crate::request_object::AuthorizationRequest;

/// Per-attempt secrets kept server-side between login and callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub anti_forgery: AntiForgeryState,
    pub pkce: PkcePair,
}

/// Result of [`AuthorizationCodeFlow::begin`]
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Where to send the user agent
    pub authorization_url: Url,
    /// Must be stored in the user's session until the callback
    pub pending: PendingAuthorization,
}

/// Query parameters of the redirect back from the provider
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Outcome of a successful login
#[derive(Clone)]
pub struct AuthenticatedSession {
    pub id_token: String,
    pub access_token: String,
    /// Verified ID token claims
    pub claims: Map<String, Value>,
    pub token_response: TokenResponse,
}

impl std::fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("id_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

/// Relying party side of the Authorization Code flow
#[derive(Debug, Clone)]
pub struct AuthorizationCodeFlow {
    context: ProviderContext,
    config: ClientConfig,
    id_tokens: IdTokenVerifier,
}

impl AuthorizationCodeFlow {
    /// Create a flow for the client registered as `config`
    pub fn new(context: ProviderContext, config: ClientConfig) -> Self {
        let id_tokens = IdTokenVerifier::new(config.client_id.clone());
        Self {
            context,
            config,
            id_tokens,
        }
    }

    /// Replace the ID token verifier
    #[must_use]
    pub fn with_id_token_verifier(mut self, verifier: IdTokenVerifier) -> Self {
        self.id_tokens = verifier;
        self
    }

    /// Client registration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a login attempt
    ///
    /// Generates state, nonce and a PKCE pair, signs a request object that
    /// carries all of them and builds the authorization endpoint URL.
    ///
    /// # Errors
    ///
    /// Fails if metadata cannot be loaded, random generation fails, the
    /// request object cannot be signed, or the authorization endpoint is not
    /// a valid URL.
    pub async fn begin(&self) -> Result<LoginRedirect, FlowError> {
        let snapshot = self.context.metadata().get_or_refresh().await?;
        let anti_forgery = AntiForgeryState::generate()?;
        let pkce = PkcePair::generate()?;

        let request_object = AuthorizationRequest {
            client_id: &self.config.client_id,
            issuer: &snapshot.metadata.issuer,
            redirect_uri: &self.config.redirect_uri,
            scopes: &self.config.scopes,
            state: &anti_forgery.state,
            nonce: &anti_forgery.nonce,
            code_challenge: &pkce.code_challenge,
        }
        .sign(self.context.signer())?;

        let endpoint = &snapshot.metadata.authorization_endpoint;
        let mut authorization_url = parse_endpoint(endpoint)?;
        authorization_url
            .query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope_string())
            .append_pair("state", &anti_forgery.state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("nonce", &anti_forgery.nonce)
            .append_pair("request", &request_object);

        debug!(authorization_endpoint = %endpoint, "Login redirect prepared");

        Ok(LoginRedirect {
            authorization_url,
            pending: PendingAuthorization { anti_forgery, pkce },
        })
    }

    /// Finish a login attempt from the provider's callback
    ///
    /// Checks `state` before any network call, exchanges the code with a
    /// fresh client assertion and the stored verifier, then verifies the ID
    /// token and its `nonce`.
    ///
    /// # Errors
    ///
    /// [`FlowError::StateMismatch`] and [`FlowError::NonceMismatch`] on
    /// anti-forgery failures; other variants for provider or token errors.
    pub async fn complete(
        &self,
        pending: PendingAuthorization,
        callback: &CallbackParams,
    ) -> Result<AuthenticatedSession, FlowError> {
        let state = callback.state.as_deref().unwrap_or_default();
        if !pending.anti_forgery.state_matches(state) {
            warn!("Callback state does not match the pending login");
            return Err(FlowError::StateMismatch);
        }

        if let Some(error) = &callback.error {
            return Err(FlowError::AuthorizationDenied {
                error: error.clone(),
                description: callback.error_description.clone(),
            });
        }
        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(FlowError::MissingCode)?;

        let snapshot = self.context.metadata().get_or_refresh().await?;
        let token_endpoint = &snapshot.metadata.token_endpoint;
        let client_assertion = assertion::mint(
            self.context.signer(),
            &self.config.client_id,
            token_endpoint,
        )?;

        let token_response = request_token(
            self.context.http_client(),
            token_endpoint,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
                ("code_verifier", &pending.pkce.code_verifier),
                ("client_id", &self.config.client_id),
                ("client_assertion", &client_assertion),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ],
        )
        .await?;

        let id_token = token_response
            .id_token
            .clone()
            .ok_or(FlowError::MissingIdToken)?;

        let verified = self
            .id_tokens
            .verify_at(&snapshot, &id_token, Utc::now().timestamp())
            .map_err(FlowError::IdTokenVerification)?;

        let nonce = verified.claims.nonce.as_deref().unwrap_or_default();
        if !pending.anti_forgery.nonce_matches(nonce) {
            warn!("ID token nonce does not match the pending login");
            return Err(FlowError::NonceMismatch);
        }

        info!(
            sub = verified.claims.registered.sub.as_deref().unwrap_or("<none>"),
            "User authenticated"
        );

        Ok(AuthenticatedSession {
            id_token,
            access_token: token_response.access_token.clone(),
            claims: verified.raw_claims,
            token_response,
        })
    }

    /// RP-initiated logout URL
    ///
    /// Falls back to the configured post-logout redirect when
    /// `post_logout_redirect_uri` is `None`.
    ///
    /// # Errors
    ///
    /// [`FlowError::EndSessionUnsupported`] when the provider advertises no
    /// end-session endpoint.
    pub async fn end_session_url(
        &self,
        id_token_hint: Option<&str>,
        post_logout_redirect_uri: Option<&str>,
    ) -> Result<Url, FlowError> {
        let snapshot = self.context.metadata().get_or_refresh().await?;
        let endpoint = snapshot
            .metadata
            .end_session_endpoint
            .as_deref()
            .ok_or(FlowError::EndSessionUnsupported)?;

        let mut url = parse_endpoint(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
            if let Some(redirect) =
                post_logout_redirect_uri.or(self.config.post_logout_redirect_uri.as_deref())
            {
                query.append_pair("post_logout_redirect_uri", redirect);
            }
        }
        Ok(url)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, FlowError> {
    Url::parse(endpoint).map_err(|e| FlowError::InvalidEndpoint {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })
}
