//! Application configuration
//!
//! Loaded from a TOML, YAML or JSON file and overridden by `TRUSTLINE_`
//! environment variables, `__` separating nested keys:
//!
//! ```text
//! TRUSTLINE_PROVIDER__DISCOVERY_URL=https://idp.example.com/.well-known/openid-configuration
//! TRUSTLINE_WEB__SIGNING_KEY='{"kty":"RSA",...}'
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use trustline_auth::{JwtSigner, ResourceServerConfig, SigningError};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TRUSTLINE";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// A section needed by the chosen command is absent
    #[error("Missing [{0}] section in configuration")]
    MissingSection(&'static str),

    /// Neither `signing_key` nor `signing_key_file` is set
    #[error("No signing key configured for [{0}]; set signing_key or signing_key_file")]
    MissingSigningKey(&'static str),

    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The signing key could not be loaded
    #[error("Invalid signing key for [{section}]: {source}")]
    SigningKey {
        section: &'static str,
        #[source]
        source: SigningError,
    },
}

/// Top-level configuration
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub provider: ProviderSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub api: Option<ApiSettings>,
    #[serde(default)]
    pub web: Option<WebSettings>,
    #[serde(default)]
    pub m2m: Option<M2mSettings>,
}

/// Identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// OpenID Connect discovery document URL
    pub discovery_url: String,
    /// Timeout for every request to the provider
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// JSON output
    #[serde(default)]
    pub structured: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            structured: false,
        }
    }
}

/// Resource server
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_bind")]
    pub bind: SocketAddr,
    /// Audience, required scope and optional assurance policy
    #[serde(flatten)]
    pub resource: ResourceServerConfig,
}

fn default_api_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3123))
}

/// Relying party
#[derive(Debug, Deserialize)]
pub struct WebSettings {
    #[serde(default = "default_web_bind")]
    pub bind: SocketAddr,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default = "default_web_scopes")]
    pub scopes: Vec<String>,
    /// Protected resource called from `/callapi`
    pub resource_endpoint: String,
    /// Mark the session cookie `Secure`; defaults to whether `redirect_uri`
    /// is https
    #[serde(default)]
    pub secure_cookie: Option<bool>,
    /// How long a started login may wait for its callback
    #[serde(default = "default_pending_login_ttl_secs")]
    pub pending_login_ttl_secs: u64,
    #[serde(flatten)]
    pub key: SigningKeySettings,
}

impl WebSettings {
    pub fn secure_cookie(&self) -> bool {
        self.secure_cookie
            .unwrap_or_else(|| self.redirect_uri.starts_with("https://"))
    }

    pub fn pending_login_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_login_ttl_secs)
    }
}

fn default_pending_login_ttl_secs() -> u64 {
    600
}

fn default_web_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 44123))
}

fn default_web_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string()]
}

/// Machine client
#[derive(Debug, Deserialize)]
pub struct M2mSettings {
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Protected resource to call with the obtained token
    pub resource_endpoint: String,
    #[serde(flatten)]
    pub key: SigningKeySettings,
}

/// Where a client's private signing key comes from
#[derive(Deserialize)]
pub struct SigningKeySettings {
    /// RSA private JWK as JSON, usually injected through the environment
    #[serde(default)]
    pub signing_key: Option<SecretString>,
    /// File holding a private JWK or an RSA PEM key
    #[serde(default)]
    pub signing_key_file: Option<PathBuf>,
    /// `kid` for JWT headers, overriding any `kid` in the key material
    #[serde(default)]
    pub key_id: Option<String>,
}

impl std::fmt::Debug for SigningKeySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeySettings")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("signing_key_file", &self.signing_key_file)
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl SigningKeySettings {
    /// Load the signer; an inline key wins over a key file
    ///
    /// # Errors
    ///
    /// Fails when no key is configured, the file cannot be read or the key
    /// is not a usable RSA key.
    pub fn load(&self, section: &'static str) -> Result<JwtSigner, ConfigError> {
        let material = match (&self.signing_key, &self.signing_key_file) {
            (Some(inline), _) => inline.expose_secret().clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?,
            (None, None) => return Err(ConfigError::MissingSigningKey(section)),
        };

        JwtSigner::from_key_material(&material, self.key_id.clone())
            .map_err(|source| ConfigError::SigningKey { section, source })
    }
}

impl AppConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `TRUSTLINE_` prefix override file
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, has an unsupported
    /// extension or does not deserialize.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("web.scopes")
                    .with_list_parse_key("m2m.scopes")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// `[api]` section
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingSection`] when absent.
    pub fn api(&self) -> Result<&ApiSettings, ConfigError> {
        self.api.as_ref().ok_or(ConfigError::MissingSection("api"))
    }

    /// `[web]` section
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingSection`] when absent.
    pub fn web(&self) -> Result<&WebSettings, ConfigError> {
        self.web.as_ref().ok_or(ConfigError::MissingSection("web"))
    }

    /// `[m2m]` section
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingSection`] when absent.
    pub fn m2m(&self) -> Result<&M2mSettings, ConfigError> {
        self.m2m.as_ref().ok_or(ConfigError::MissingSection("m2m"))
    }
}
