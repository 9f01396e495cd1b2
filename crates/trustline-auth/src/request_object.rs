//! Signed authorization request objects (JAR, RFC 9101)
//!
//! The full authorization request is carried as a PS256-signed JWT in the
//! `request` parameter, signed with the same key as the client assertions.

use chrono::Utc;

use crate::assertion::{ASSERTION_LIFETIME_SECS, JTI_LENGTH};
use crate::jwt::{JwtSigner, RequestObjectClaims, SigningError};
use crate::pkce::{CODE_CHALLENGE_METHOD, RandomError, random_string};

/// Parameters of one authorization request
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub client_id: &'a str,
    /// Audience of the request object
    pub issuer: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a [String],
    pub state: &'a str,
    pub nonce: &'a str,
    pub code_challenge: &'a str,
}

impl AuthorizationRequest<'_> {
    /// Request object claims issued at `now`, valid for 60 seconds
    ///
    /// # Errors
    ///
    /// Returns [`RandomError`] if the `jti` cannot be generated.
    pub fn claims(&self, now: i64) -> Result<RequestObjectClaims, RandomError> {
        Ok(RequestObjectClaims {
            jti: random_string(JTI_LENGTH)?,
            nbf: now,
            exp: now + ASSERTION_LIFETIME_SECS,
            iss: self.client_id.to_string(),
            client_id: self.client_id.to_string(),
            aud: self.issuer.to_string(),
            response_type: "code".to_string(),
            redirect_uri: self.redirect_uri.to_string(),
            scope: self.scopes.join(" "),
            state: self.state.to_string(),
            nonce: self.nonce.to_string(),
            code_challenge: self.code_challenge.to_string(),
            code_challenge_method: CODE_CHALLENGE_METHOD.to_string(),
        })
    }

    /// Build and sign the request object
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the `jti` cannot be generated or signing fails.
    pub fn sign(&self, signer: &JwtSigner) -> Result<String, SigningError> {
        signer.sign(&self.claims(Utc::now().timestamp())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::jwk::Jwk;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    const CLIENT_PRIVATE_JWK: &str = include_str!("../tests/fixtures/client_private_jwk.json");
    const CLIENT_PUBLIC_JWK: &str = include_str!("../tests/fixtures/client_public_jwk.json");

    fn request(scopes: &[String]) -> AuthorizationRequest<'_> {
        AuthorizationRequest {
            client_id: "web-app",
            issuer: "https://idp.example.com",
            redirect_uri: "http://localhost:44123/callback",
            scopes,
            state: "state-value",
            nonce: "nonce-value",
            code_challenge: "challenge-value",
        }
    }

    #[test]
    fn test_claims_carry_every_parameter() {
        let scopes = vec!["openid".to_string(), "profile".to_string()];
        let claims = request(&scopes).claims(500).unwrap();

        assert_eq!(claims.iss, "web-app");
        assert_eq!(claims.client_id, "web-app");
        assert_eq!(claims.aud, "https://idp.example.com");
        assert_eq!(claims.response_type, "code");
        assert_eq!(claims.redirect_uri, "http://localhost:44123/callback");
        assert_eq!(claims.scope, "openid profile");
        assert_eq!(claims.state, "state-value");
        assert_eq!(claims.nonce, "nonce-value");
        assert_eq!(claims.code_challenge, "challenge-value");
        assert_eq!(claims.code_challenge_method, "S256");
        assert_eq!(claims.jti.len(), 24);
        assert_eq!(claims.nbf, 500);
        assert_eq!(claims.exp, 560);
    }

    #[test]
    fn test_signed_request_object_round_trips() {
        let signer = JwtSigner::from_jwk_json(CLIENT_PRIVATE_JWK).unwrap();
        let scopes = vec!["openid".to_string()];
        let token = request(&scopes).sign(&signer).unwrap();

        let jwk: Jwk = serde_json::from_str(CLIENT_PUBLIC_JWK).unwrap();
        let mut validation = Validation::new(Algorithm::PS256);
        validation.set_audience(&["https://idp.example.com"]);
        let claims = decode::<RequestObjectClaims>(
            &token,
            &DecodingKey::from_jwk(&jwk).unwrap(),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.state, "state-value");
        assert_eq!(claims.scope, "openid");
    }
}
