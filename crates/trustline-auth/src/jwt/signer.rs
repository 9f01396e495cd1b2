//! PS256 signing with an injected RSA private key
//!
//! The key is loaded once, either from a private RSA JWK (the format most
//! identity providers hand out when registering a client) or from a PEM file.
//! [`JwtSigner`] holds no mutable state, so one instance can be shared behind
//! an `Arc` and used from any number of concurrent requests.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pkce::RandomError;

/// Signing errors
#[derive(Debug, Error)]
pub enum SigningError {
    /// The key material could not be turned into an RSA signing key
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// The key declares an algorithm other than PS256
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// JWT encoding or signing failed
    #[error("failed to sign JWT: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),

    /// A fresh `jti` could not be generated
    #[error(transparent)]
    Random(#[from] RandomError),
}

/// Private RSA JWK (RFC 7518 §6.3.2)
#[derive(Deserialize)]
struct RsaPrivateJwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    n: String,
    e: String,
    d: String,
    p: String,
    q: String,
}

fn decode_component(name: &str, value: &str) -> Result<BigUint, SigningError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| SigningError::InvalidKey(format!("JWK parameter '{name}': {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// PS256 JWT signer
#[derive(Clone)]
pub struct JwtSigner {
    key: EncodingKey,
    key_id: Option<String>,
}

// Manual Debug impl so key material never ends up in logs
impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigner")
            .field("algorithm", &Algorithm::PS256)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl JwtSigner {
    /// Load a signer from a private RSA JWK
    ///
    /// The JWK `kid` is placed in the header of every signed token.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::InvalidKey`] if the JSON is not a complete
    /// private RSA key, or [`SigningError::UnsupportedAlgorithm`] if it
    /// declares an `alg` other than PS256.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use trustline_auth::JwtSigner;
    ///
    /// let jwk = std::fs::read_to_string("client_private_jwk.json")?;
    /// let signer = JwtSigner::from_jwk_json(&jwk)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_jwk_json(jwk: &str) -> Result<Self, SigningError> {
        let jwk: RsaPrivateJwk = serde_json::from_str(jwk)
            .map_err(|e| SigningError::InvalidKey(format!("not a private RSA JWK: {e}")))?;

        if jwk.kty != "RSA" {
            return Err(SigningError::InvalidKey(format!(
                "expected kty RSA, found {}",
                jwk.kty
            )));
        }
        if let Some(alg) = &jwk.alg
            && alg != "PS256"
        {
            return Err(SigningError::UnsupportedAlgorithm(alg.clone()));
        }

        let key = RsaPrivateKey::from_components(
            decode_component("n", &jwk.n)?,
            decode_component("e", &jwk.e)?,
            decode_component("d", &jwk.d)?,
            vec![decode_component("p", &jwk.p)?, decode_component("q", &jwk.q)?],
        )
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        key.validate()
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

        let der = key
            .to_pkcs1_der()
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

        Ok(Self {
            key: EncodingKey::from_rsa_der(der.as_bytes()),
            key_id: jwk.kid,
        })
    }

    /// Load a signer from a PKCS#1 or PKCS#8 RSA PEM
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::InvalidKey`] if the PEM does not hold an RSA
    /// private key.
    pub fn from_rsa_pem(pem: &[u8], key_id: Option<String>) -> Result<Self, SigningError> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self { key, key_id })
    }

    /// Load a signer from key material of either supported format
    ///
    /// Material starting with `{` is read as a JWK, anything else as PEM.
    ///
    /// # Errors
    ///
    /// See [`from_jwk_json`](Self::from_jwk_json) and
    /// [`from_rsa_pem`](Self::from_rsa_pem).
    pub fn from_key_material(material: &str, key_id: Option<String>) -> Result<Self, SigningError> {
        let trimmed = material.trim_start();
        if trimmed.starts_with('{') {
            let signer = Self::from_jwk_json(trimmed)?;
            Ok(match key_id {
                Some(kid) => signer.with_key_id(kid),
                None => signer,
            })
        } else {
            Self::from_rsa_pem(trimmed.as_bytes(), key_id)
        }
    }

    /// Override the `kid` placed in token headers
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// The `kid` placed in token headers, if any
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Sign `claims` as a compact PS256 JWT
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Encode`] if serialization or signing fails.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, SigningError> {
        let mut header = Header::new(Algorithm::PS256);
        header.kid.clone_from(&self.key_id);
        Ok(encode(&header, claims, &self.key)?)
    }
}
