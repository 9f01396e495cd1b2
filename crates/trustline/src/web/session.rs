//! In-memory session store keyed by the `auth-session` cookie

use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use cookie::{Cookie, SameSite};
use dashmap::DashMap;
use serde_json::{Map, Value};
use trustline_auth::oauth2::{AuthenticatedSession, PendingAuthorization};
use trustline_auth::{RandomError, random_string};

pub const SESSION_COOKIE_NAME: &str = "auth-session";

const SESSION_ID_LENGTH: usize = 32;

/// Time allowed between `/login` and `/callback`
pub const DEFAULT_PENDING_LOGIN_TTL: Duration = Duration::from_secs(600);

/// Tokens and claims of a signed-in user
#[derive(Clone)]
pub struct SignedIn {
    pub id_token: String,
    pub access_token: String,
    pub claims: Map<String, Value>,
}

impl From<AuthenticatedSession> for SignedIn {
    fn from(session: AuthenticatedSession) -> Self {
        Self {
            id_token: session.id_token,
            access_token: session.access_token,
            claims: session.claims,
        }
    }
}

impl std::fmt::Debug for SignedIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedIn")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

/// Per-browser state
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Between `/login` and `/callback`
    pub pending: Option<PendingAuthorization>,
    /// When the pending login was started
    pub login_started: Option<Instant>,
    pub signed_in: Option<SignedIn>,
}

impl Session {
    fn pending_expired(&self, ttl: Duration) -> bool {
        self.login_started.is_none_or(|started| started.elapsed() >= ttl)
    }
}

/// Sessions by id
///
/// Entries without a sign-in live only as long as their pending login.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    pending_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_pending_ttl(DEFAULT_PENDING_LOGIN_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose pending logins expire after `pending_ttl`
    pub fn with_pending_ttl(pending_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            pending_ttl,
        }
    }

    /// Fresh random session id
    ///
    /// # Errors
    ///
    /// Returns [`RandomError`] if the random source fails.
    pub fn new_id() -> Result<String, RandomError> {
        random_string(SESSION_ID_LENGTH)
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    /// Whether `id` was issued by this store and is still live
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Start a login in session `id`, dropping any previous sign-in
    pub fn begin_login(&self, id: &str, pending: PendingAuthorization) {
        self.evict_expired();
        self.sessions.insert(
            id.to_string(),
            Session {
                pending: Some(pending),
                login_started: Some(Instant::now()),
                signed_in: None,
            },
        );
    }

    /// Remove and return the pending login; a second call gets `None`
    ///
    /// An expired login is removed but not returned.
    pub fn take_pending(&self, id: &str) -> Option<PendingAuthorization> {
        let mut session = self.sessions.get_mut(id)?;
        let expired = session.pending_expired(self.pending_ttl);
        session.login_started = None;
        let pending = session.pending.take();
        (!expired).then_some(pending).flatten()
    }

    pub fn sign_in(&self, id: &str, signed_in: SignedIn) {
        self.sessions.entry(id.to_string()).or_default().signed_in = Some(signed_in);
    }

    pub fn signed_in(&self, id: &str) -> Option<SignedIn> {
        self.sessions.get(id).and_then(|s| s.signed_in.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Drop sessions that hold neither a sign-in nor a live pending login
    pub fn evict_expired(&self) {
        let ttl = self.pending_ttl;
        self.sessions.retain(|_, session| {
            session.signed_in.is_some() || (session.pending.is_some() && !session.pending_expired(ttl))
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Session id from the request's `Cookie` headers
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|part| Cookie::parse(part.trim()).ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
}

/// `Set-Cookie` value binding the browser to session `id`
pub fn session_cookie(id: &str, secure: bool) -> String {
    Cookie::build((SESSION_COOKIE_NAME, id))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
        .to_string()
}

/// `Set-Cookie` value deleting the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::ZERO)
        .build()
        .to_string()
}
