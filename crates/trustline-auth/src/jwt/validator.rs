//! Bearer access token and ID token verification
//!
//! Both token kinds go through the same pipeline:
//!
//! 1. Parse the JOSE header; failure is [`ValidationError::MalformedToken`].
//! 2. Resolve the key named by `kid` in the cached key set and verify the
//!    signature; failure is [`ValidationError::InvalidSignature`].
//! 3. Check the registered claims with zero leeway: more than one audience is
//!    [`ValidationError::MultipleAudiences`]; issuer, audience, `[nbf, exp)`
//!    and `iat` failures are [`ValidationError::ClaimValidationFailed`].
//!
//! The bearer validator additionally enforces a required scope, and the ID
//! token verifier returns the `nonce` for the caller to compare.

use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::claims::{AccessTokenClaims, AssurancePolicy, IdTokenClaims, IdentityClaims, RegisteredClaims};
use super::jwks::KeySet;
use crate::config::ResourceServerConfig;
use crate::discovery::{MetadataCache, ProviderSnapshot};

/// Token validation failures
///
/// The display text is what the resource server sends back in the plain-text
/// 401 body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The `Authorization` header is missing or not `Bearer <token>`
    #[error(
        "authorization header format must be: Bearer {{the base64 url encoded access token without curly braces}}"
    )]
    MalformedHeader,

    /// The token is not a well-formed signed JWT
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// No cached key verifies the signature
    #[error("invalid token signature: {0}")]
    InvalidSignature(String),

    /// The token names more than one audience
    #[error("access token contained multiple audiences")]
    MultipleAudiences,

    /// Issuer, audience or time window rejected
    #[error("token claims rejected: {0}")]
    ClaimValidationFailed(String),

    /// The required scope is not granted
    #[error("access token did not contain the required scope")]
    InsufficientScope,

    /// No provider metadata has been loaded yet
    #[error("provider metadata is not available")]
    MetadataUnavailable,
}

impl ValidationError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MetadataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Split an `Authorization` header value into its bearer token
///
/// The value must consist of exactly two whitespace-separated fields and the
/// first must be `bearer` in any case.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedHeader`] otherwise.
pub fn extract_bearer(authorization: &str) -> Result<&str, ValidationError> {
    let mut fields = authorization.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(ValidationError::MalformedHeader),
    }
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256, Algorithm::PS256, Algorithm::ES256]
}

/// Signature verification against the cached key set
///
/// Returns the verified payload as a JSON object.
fn verify_signature(
    token: &str,
    keys: &KeySet,
    allowed_algorithms: &[Algorithm],
) -> Result<(Algorithm, String, Map<String, Value>), ValidationError> {
    let header = decode_header(token).map_err(|e| {
        debug!(error = %e, "Failed to decode JWT header");
        ValidationError::MalformedToken(e.to_string())
    })?;

    if !allowed_algorithms.contains(&header.alg) {
        return Err(ValidationError::InvalidSignature(format!(
            "algorithm {:?} not allowed",
            header.alg
        )));
    }

    let key_id = header
        .kid
        .ok_or_else(|| ValidationError::InvalidSignature("token header has no kid".to_string()))?;

    let jwk = keys.find(&key_id).ok_or_else(|| {
        ValidationError::InvalidSignature(format!("key id '{key_id}' not found in JWKS"))
    })?;
    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| ValidationError::InvalidSignature(format!("unusable JWK '{key_id}': {e}")))?;

    // Time and audience checks happen below with zero leeway
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                ValidationError::MalformedToken(e.to_string())
            }
            _ => ValidationError::InvalidSignature(e.to_string()),
        }
    })?;

    Ok((header.alg, key_id, data.claims))
}

fn parse_claims<T: DeserializeOwned>(claims: &Map<String, Value>) -> Result<T, ValidationError> {
    serde_json::from_value(Value::Object(claims.clone()))
        .map_err(|e| ValidationError::MalformedToken(format!("unexpected claim type: {e}")))
}

/// Issuer, audience and time checks with zero leeway
fn check_registered(
    claims: &RegisteredClaims,
    issuer: &str,
    audience: &str,
    now: i64,
) -> Result<(), ValidationError> {
    let aud = claims.aud.as_ref();
    if aud.is_some_and(|aud| aud.len() > 1) {
        return Err(ValidationError::MultipleAudiences);
    }

    if claims.iss.as_deref() != Some(issuer) {
        return Err(ValidationError::ClaimValidationFailed(format!(
            "invalid issuer {:?}, expected {issuer:?}",
            claims.iss
        )));
    }

    if !aud.is_some_and(|aud| aud.contains(audience)) {
        return Err(ValidationError::ClaimValidationFailed(format!(
            "invalid audience, expected {audience:?}"
        )));
    }

    let exp = claims
        .exp
        .ok_or_else(|| ValidationError::ClaimValidationFailed("missing exp claim".to_string()))?;
    if now >= exp {
        return Err(ValidationError::ClaimValidationFailed(
            "token is expired".to_string(),
        ));
    }

    if let Some(nbf) = claims.nbf
        && now < nbf
    {
        return Err(ValidationError::ClaimValidationFailed(
            "token is not valid yet".to_string(),
        ));
    }

    if let Some(iat) = claims.iat
        && iat > now
    {
        return Err(ValidationError::ClaimValidationFailed(
            "token issued in the future".to_string(),
        ));
    }

    Ok(())
}

/// A bearer token that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    /// Typed view of the claims
    pub claims: AccessTokenClaims,
    /// Identity-proofing claims, empty when absent
    pub identity: IdentityClaims,
    /// Every claim in the payload
    pub raw_claims: Map<String, Value>,
    /// `kid` of the verifying key
    pub key_id: String,
    /// Signature algorithm
    pub algorithm: Algorithm,
}

/// Resource server validator for inbound bearer tokens
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use trustline_auth::{BearerValidator, MetadataCache};
/// # tokio_test::block_on(async {
/// # let cache: Arc<MetadataCache> = todo!();
/// let validator = BearerValidator::new(cache, "sample-api").require_scope("sample-api/foo");
///
/// let mut headers = http::HeaderMap::new();
/// headers.insert(http::header::AUTHORIZATION, "Bearer eyJ...".parse()?);
/// match validator.validate(&headers).await {
///     Ok(token) => println!("client: {:?}", token.claims.client_id),
///     Err(e) => println!("rejected ({}): {e}", e.status_code()),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct BearerValidator {
    /// Provider metadata and keys
    metadata: Arc<MetadataCache>,
    /// Expected single audience
    audience: String,
    /// Scope every token must grant
    required_scope: Option<String>,
    /// Accepted signature algorithms
    allowed_algorithms: Vec<Algorithm>,
    /// Identity assurance requirements
    assurance: Option<AssurancePolicy>,
}

// Manual Debug impl to keep the cache contents out of request logs
impl std::fmt::Debug for BearerValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerValidator")
            .field("discovery_url", &self.metadata.discovery_url())
            .field("audience", &self.audience)
            .field("required_scope", &self.required_scope)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("assurance", &self.assurance)
            .finish()
    }
}

impl BearerValidator {
    /// Create a validator accepting tokens for `audience`
    ///
    /// Defaults: no required scope, RS256/PS256/ES256, no assurance policy.
    pub fn new(metadata: Arc<MetadataCache>, audience: impl Into<String>) -> Self {
        Self {
            metadata,
            audience: audience.into(),
            required_scope: None,
            allowed_algorithms: default_algorithms(),
            assurance: None,
        }
    }

    /// Create a validator from resource server settings
    pub fn from_config(metadata: Arc<MetadataCache>, config: &ResourceServerConfig) -> Self {
        Self {
            required_scope: config.required_scope.clone(),
            assurance: config.assurance.clone(),
            ..Self::new(metadata, &config.audience)
        }
    }

    /// Require `scope` in every token
    #[must_use]
    pub fn require_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = Some(scope.into());
        self
    }

    /// Set accepted signature algorithms
    ///
    /// Only asymmetric algorithms make sense here; the key set carries no
    /// shared secrets.
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Enforce identity-assurance requirements
    #[must_use]
    pub fn with_assurance_policy(mut self, policy: AssurancePolicy) -> Self {
        self.assurance = Some(policy);
        self
    }

    /// Expected audience
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Required scope, if any
    pub fn required_scope(&self) -> Option<&str> {
        self.required_scope.as_deref()
    }

    /// Validate the `Authorization` header of a request
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ValidationError`]; validation is
    /// all-or-nothing.
    pub async fn validate(&self, headers: &http::HeaderMap) -> Result<ValidatedToken, ValidationError> {
        let authorization = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        extract_bearer(authorization)?;

        let snapshot = self
            .metadata
            .get()
            .await
            .ok_or(ValidationError::MetadataUnavailable)?;

        self.validate_header_at(&snapshot, authorization, Utc::now().timestamp())
    }

    /// Validate an `Authorization` header value against `snapshot` at `now`
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ValidationError`].
    pub fn validate_header_at(
        &self,
        snapshot: &ProviderSnapshot,
        authorization: &str,
        now: i64,
    ) -> Result<ValidatedToken, ValidationError> {
        let token = extract_bearer(authorization)?;
        let result = self.validate_token_at(snapshot, token, now);
        if let Err(e) = &result {
            warn!(error = %e, audience = %self.audience, "Bearer token rejected");
        }
        result
    }

    fn validate_token_at(
        &self,
        snapshot: &ProviderSnapshot,
        token: &str,
        now: i64,
    ) -> Result<ValidatedToken, ValidationError> {
        let (algorithm, key_id, raw_claims) =
            verify_signature(token, &snapshot.keys, &self.allowed_algorithms)?;

        let claims: AccessTokenClaims = parse_claims(&raw_claims)?;
        check_registered(&claims.registered, &snapshot.metadata.issuer, &self.audience, now)?;

        // Signature already verified above
        if let Some(scope) = &self.required_scope
            && !claims.has_scope(scope)
        {
            return Err(ValidationError::InsufficientScope);
        }

        let identity: IdentityClaims =
            serde_json::from_value(Value::Object(raw_claims.clone())).unwrap_or_default();
        if let Some(policy) = &self.assurance {
            policy
                .check(&identity)
                .map_err(ValidationError::ClaimValidationFailed)?;
        }

        debug!(
            audience = %self.audience,
            subject = ?claims.registered.sub,
            client_id = ?claims.client_id,
            algorithm = ?algorithm,
            "Bearer token validated"
        );

        Ok(ValidatedToken {
            claims,
            identity,
            raw_claims,
            key_id,
            algorithm,
        })
    }
}

/// A verified ID token
#[derive(Debug, Clone)]
pub struct VerifiedIdToken {
    /// Typed view including `nonce`
    pub claims: IdTokenClaims,
    /// Every claim in the payload
    pub raw_claims: Map<String, Value>,
}

/// Relying party verifier for ID tokens returned by the token endpoint
///
/// Applies the same signature and claim rules as [`BearerValidator`] with the
/// client id as audience. The nonce is compared by the caller, which owns the
/// stored value.
#[derive(Debug, Clone)]
pub struct IdTokenVerifier {
    client_id: String,
    allowed_algorithms: Vec<Algorithm>,
}

impl IdTokenVerifier {
    /// Verifier for tokens issued to `client_id`
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            allowed_algorithms: default_algorithms(),
        }
    }

    /// Set accepted signature algorithms
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Verify `id_token` against `snapshot` at `now`
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ValidationError`].
    pub fn verify_at(
        &self,
        snapshot: &ProviderSnapshot,
        id_token: &str,
        now: i64,
    ) -> Result<VerifiedIdToken, ValidationError> {
        let (_, _, raw_claims) = verify_signature(id_token, &snapshot.keys, &self.allowed_algorithms)?;
        let claims: IdTokenClaims = parse_claims(&raw_claims)?;
        check_registered(&claims.registered, &snapshot.metadata.issuer, &self.client_id, now)?;

        Ok(VerifiedIdToken { claims, raw_claims })
    }
}
