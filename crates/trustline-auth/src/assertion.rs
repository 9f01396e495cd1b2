//! Client assertions for `private_key_jwt` client authentication
//!
//! Each token endpoint call gets a freshly minted assertion with its own
//! 24-character `jti`, valid for 60 seconds.

use chrono::Utc;

use crate::jwt::{ClientAssertionClaims, JwtSigner, SigningError};
use crate::pkce::{RandomError, random_string};

/// Value of the `client_assertion_type` form parameter
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Assertion lifetime in seconds
pub const ASSERTION_LIFETIME_SECS: i64 = 60;

/// Length of the random `jti`
pub const JTI_LENGTH: usize = 24;

impl ClientAssertionClaims {
    /// Claims for an assertion issued at `now` (seconds since the epoch)
    ///
    /// # Errors
    ///
    /// Returns [`RandomError`] if the `jti` cannot be generated.
    pub fn issue(client_id: &str, token_endpoint: &str, now: i64) -> Result<Self, RandomError> {
        Ok(Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: token_endpoint.to_string(),
            jti: random_string(JTI_LENGTH)?,
            nbf: now,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        })
    }
}

/// Mint a signed client assertion for `token_endpoint`
///
/// # Errors
///
/// Returns [`SigningError`] if the `jti` cannot be generated or signing fails.
pub fn mint(
    signer: &JwtSigner,
    client_id: &str,
    token_endpoint: &str,
) -> Result<String, SigningError> {
    let claims = ClientAssertionClaims::issue(client_id, token_endpoint, Utc::now().timestamp())?;
    signer.sign(&claims)
}
