//! Relying party web app
//!
//! ```text
//! /          home, or 303 to /user when signed in
//! /login     307 to the provider with PKCE, state, nonce and a request object
//! /callback  state check, code exchange, ID token check, 303 to /user
//! /user      signed-in claims, or 303 to /
//! /logout    clears the session, 307 to the provider's end-session endpoint
//! /callapi   calls the protected API with the session's access token
//! ```

pub mod session;

use std::sync::Arc;

use anyhow::Context as _;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use trustline_auth::oauth2::CallbackParams;
use trustline_auth::{
    AuthorizationCodeFlow, ClientConfig, FlowError, MetadataCache, ProviderContext, context,
};

use crate::config::AppConfig;
use session::{SessionStore, SignedIn, clear_session_cookie, session_cookie, session_id};

/// Shared handler state
#[derive(Clone)]
pub struct WebState {
    pub flow: Arc<AuthorizationCodeFlow>,
    pub sessions: Arc<SessionStore>,
    /// Client for calls to the protected resource
    pub http_client: reqwest::Client,
    pub resource_endpoint: String,
    /// Set `Secure` on the session cookie
    pub secure_cookies: bool,
}

/// Handler failure rendered as a plain-text response
#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<FlowError> for WebError {
    fn from(e: FlowError) -> Self {
        let status = e.status_code();
        if status.is_server_error() {
            error!(error = %e, "Login flow failed");
        } else {
            warn!(error = %e, "Login flow rejected");
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/user", get(user))
        .route("/logout", get(logout))
        .route("/callapi", get(call_api))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = cookie.parse() {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

async fn home(State(state): State<WebState>, headers: HeaderMap) -> Response {
    let signed_in = session_id(&headers).is_some_and(|id| state.sessions.signed_in(&id).is_some());
    if signed_in {
        return Redirect::to("/user").into_response();
    }
    Html(
        "<!DOCTYPE html><html><body>\
         <h1>trustline</h1>\
         <p><a href=\"/login\">Log in</a></p>\
         </body></html>",
    )
    .into_response()
}

async fn login(State(state): State<WebState>, headers: HeaderMap) -> Result<Response, WebError> {
    // Only ids this server issued are reused
    let id = match session_id(&headers).filter(|id| state.sessions.contains(id)) {
        Some(id) => id,
        None => SessionStore::new_id().map_err(FlowError::from)?,
    };

    let redirect = state.flow.begin().await?;
    state.sessions.begin_login(&id, redirect.pending);

    let response = Redirect::temporary(redirect.authorization_url.as_str()).into_response();
    Ok(with_cookie(response, &session_cookie(&id, state.secure_cookies)))
}

async fn callback(
    State(state): State<WebState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, WebError> {
    let id = session_id(&headers).ok_or(FlowError::StateMismatch)?;
    let pending = state
        .sessions
        .take_pending(&id)
        .ok_or(FlowError::StateMismatch)?;

    let session = state.flow.complete(pending, &params).await?;

    // The signed-in session gets an id the browser has never presented
    state.sessions.remove(&id);
    let signed_in_id = SessionStore::new_id().map_err(FlowError::from)?;
    state.sessions.sign_in(&signed_in_id, SignedIn::from(session));
    info!("Session established");

    let response = Redirect::to("/user").into_response();
    Ok(with_cookie(
        response,
        &session_cookie(&signed_in_id, state.secure_cookies),
    ))
}

async fn user(State(state): State<WebState>, headers: HeaderMap) -> Response {
    match session_id(&headers).and_then(|id| state.sessions.signed_in(&id)) {
        Some(signed_in) => Json(signed_in.claims).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

async fn logout(State(state): State<WebState>, headers: HeaderMap) -> Result<Response, WebError> {
    let id_token = session_id(&headers)
        .and_then(|id| state.sessions.remove(&id))
        .and_then(|session| session.signed_in)
        .map(|signed_in| signed_in.id_token);

    let target = match state.flow.end_session_url(id_token.as_deref(), None).await {
        Ok(url) => url.to_string(),
        Err(FlowError::EndSessionUnsupported) => state
            .flow
            .config()
            .post_logout_redirect_uri
            .clone()
            .unwrap_or_else(|| "/".to_string()),
        Err(e) => return Err(e.into()),
    };

    let response = Redirect::temporary(&target).into_response();
    Ok(with_cookie(response, &clear_session_cookie(state.secure_cookies)))
}

async fn call_api(State(state): State<WebState>, headers: HeaderMap) -> Result<String, WebError> {
    let access_token = session_id(&headers)
        .and_then(|id| state.sessions.signed_in(&id))
        .map(|signed_in| signed_in.access_token)
        .ok_or_else(|| WebError::new(StatusCode::FORBIDDEN, "No access token found in session"))?;

    let response = state
        .http_client
        .get(&state.resource_endpoint)
        .bearer_auth(&access_token)
        .send()
        .await
        .map_err(|e| {
            WebError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Making a request to the api failed, error: {e}"),
            )
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| WebError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(format!(
        "Resource endpoint: {}\nStatus: {}\nBody: {}\n",
        state.resource_endpoint, status, body
    ))
}

/// Build the handler state from configuration
///
/// # Errors
///
/// Fails if the `[web]` section or its signing key is missing or invalid,
/// or if provider metadata and keys cannot be loaded.
pub async fn state(config: &AppConfig) -> anyhow::Result<WebState> {
    let settings = config.web()?;
    let signer = settings.key.load("web")?;
    let http = context::http_client(config.provider.timeout())?;

    let metadata = Arc::new(
        MetadataCache::new(&config.provider.discovery_url, http.clone()).with_jwks(true),
    );
    metadata
        .refresh()
        .await
        .context("Failed to load provider metadata and keys")?;

    let mut client = ClientConfig::new(&settings.client_id, &settings.redirect_uri)
        .with_scopes(settings.scopes.iter().cloned());
    client.post_logout_redirect_uri.clone_from(&settings.post_logout_redirect_uri);

    Ok(WebState {
        flow: Arc::new(AuthorizationCodeFlow::new(
            ProviderContext::new(metadata, Arc::new(signer), http.clone()),
            client,
        )),
        sessions: Arc::new(SessionStore::with_pending_ttl(settings.pending_login_ttl())),
        http_client: http,
        resource_endpoint: settings.resource_endpoint.clone(),
        secure_cookies: settings.secure_cookie(),
    })
}

/// Run the relying party until shutdown
///
/// # Errors
///
/// Fails on bootstrap errors or if the listener cannot bind.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let bind = config.web()?.bind;
    let app = router(state(config).await?);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(addr = %bind, "Web app listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown_signal())
        .await?;
    Ok(())
}
