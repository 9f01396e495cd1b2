//! Client and resource server configuration
//!
//! Plain serde structs. Loading them from files or the environment is up to
//! the embedding application.

use serde::{Deserialize, Serialize};

use crate::jwt::AssurancePolicy;

/// Registration of an OAuth2 client with the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client identifier; also `iss` and `sub` of every client assertion
    pub client_id: String,

    /// Callback URL registered for the Authorization Code flow
    #[serde(default)]
    pub redirect_uri: String,

    /// Where the provider sends the user after logout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,

    /// Requested scopes
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string()]
}

impl ClientConfig {
    /// Create a config with the default `openid profile` scopes
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            post_logout_redirect_uri: None,
            scopes: default_scopes(),
        }
    }

    /// Replace the requested scopes
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the post-logout redirect URI
    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    /// Scopes joined with single spaces, as sent on the wire
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Resource server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceServerConfig {
    /// This API's identifier; must be the single `aud` of accepted tokens
    pub audience: String,

    /// Scope every request must carry, formatted `<api-name>/<operation>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scope: Option<String>,

    /// Identity-assurance requirements (off unless set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assurance: Option<AssurancePolicy>,
}
