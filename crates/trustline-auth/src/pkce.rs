//! Random strings, PKCE pairs and anti-forgery values
//!
//! Every value here is drawn from the operating system CSPRNG. A failing
//! random source is reported as [`RandomError`]; there is no fallback to a
//! weaker generator.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Length of the PKCE code verifier
pub const CODE_VERIFIER_LENGTH: usize = 64;

/// Length of the `state` and `nonce` values
pub const ANTI_FORGERY_LENGTH: usize = 64;

/// The only code challenge method this crate produces
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// The secure random source failed
#[derive(Debug, Error)]
#[error("secure random source failed: {0}")]
pub struct RandomError(#[from] rand::Error);

/// Generate a URL-safe, unpadded base64 string of exactly `length` characters
///
/// `ceil(0.75 * length)` random bytes are encoded and the encoding is
/// truncated, so every character carries six bits of entropy.
///
/// # Errors
///
/// Returns [`RandomError`] if the operating system random source fails.
///
/// # Example
///
/// ```rust
/// let jti = trustline_auth::random_string(24)?;
/// assert_eq!(jti.len(), 24);
/// # Ok::<(), trustline_auth::RandomError>(())
/// ```
pub fn random_string(length: usize) -> Result<String, RandomError> {
    let mut bytes = vec![0u8; (3 * length).div_ceil(4)];
    OsRng.try_fill_bytes(&mut bytes)?;

    let mut encoded = URL_SAFE_NO_PAD.encode(&bytes);
    encoded.truncate(length);
    Ok(encoded)
}

/// Byte-exact comparison that does not short-circuit on the first mismatch
pub(crate) fn secure_eq(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

/// PKCE code verifier and its S256 challenge
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PkcePair {
    /// Kept server-side until the code exchange
    pub code_verifier: String,
    /// `base64url(SHA-256(code_verifier))`, sent to the authorization endpoint
    pub code_challenge: String,
}

impl PkcePair {
    /// Generate a fresh 64-character verifier and its challenge
    ///
    /// # Errors
    ///
    /// Returns [`RandomError`] if the random source fails.
    pub fn generate() -> Result<Self, RandomError> {
        Ok(Self::from_verifier(random_string(CODE_VERIFIER_LENGTH)?))
    }

    /// Derive the challenge for an existing verifier
    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = challenge_for(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

// Manual Debug impl so the verifier never ends up in logs
impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// S256 code challenge: `base64url(SHA-256(verifier))` without padding
pub fn challenge_for(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Per-login `state` and `nonce`
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AntiForgeryState {
    /// Echoed back by the authorization server on the callback
    pub state: String,
    /// Echoed back inside the ID token
    pub nonce: String,
}

impl AntiForgeryState {
    /// Generate a fresh state and nonce
    ///
    /// # Errors
    ///
    /// Returns [`RandomError`] if the random source fails.
    pub fn generate() -> Result<Self, RandomError> {
        Ok(Self {
            state: random_string(ANTI_FORGERY_LENGTH)?,
            nonce: random_string(ANTI_FORGERY_LENGTH)?,
        })
    }

    /// Whether the callback `state` parameter equals the stored one
    pub fn state_matches(&self, candidate: &str) -> bool {
        secure_eq(&self.state, candidate)
    }

    /// Whether an ID token `nonce` claim equals the stored one
    pub fn nonce_matches(&self, candidate: &str) -> bool {
        secure_eq(&self.nonce, candidate)
    }
}

impl std::fmt::Debug for AntiForgeryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiForgeryState")
            .field("state", &"<redacted>")
            .field("nonce", &"<redacted>")
            .finish()
    }
}
