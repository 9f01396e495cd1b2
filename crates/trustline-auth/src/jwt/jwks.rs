//! JWKS (JSON Web Key Set) parsing
//!
//! Keys are decoded one at a time. A key that does not decode (unknown `kty`,
//! missing modulus, ...) is skipped with a warning and counted. A document
//! that is not a key set at all is still an error.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::Deserialize;
use tracing::warn;

#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

/// Verification keys published by the authorization server
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: JwkSet,
    skipped: usize,
}

impl Default for KeySet {
    fn default() -> Self {
        Self::from_jwks(JwkSet { keys: Vec::new() })
    }
}

impl KeySet {
    /// Parse a JWKS document, skipping keys that fail to decode
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document is not an object with a `keys`
    /// array.
    pub fn from_slice(document: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawKeySet = serde_json::from_slice(document)?;

        let mut keys = Vec::with_capacity(raw.keys.len());
        let mut skipped = 0;
        for (index, value) in raw.keys.into_iter().enumerate() {
            match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => keys.push(jwk),
                Err(e) => {
                    warn!(index, error = %e, "Skipping JWK that failed to decode");
                    skipped += 1;
                }
            }
        }

        Ok(Self {
            keys: JwkSet { keys },
            skipped,
        })
    }

    /// Wrap an already decoded set
    pub fn from_jwks(keys: JwkSet) -> Self {
        Self { keys, skipped: 0 }
    }

    /// Find a key by its `kid`
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.find(kid)
    }

    /// Number of usable keys
    pub fn len(&self) -> usize {
        self.keys.keys.len()
    }

    /// True when no usable key was loaded
    pub fn is_empty(&self) -> bool {
        self.keys.keys.is_empty()
    }

    /// Number of keys skipped while parsing
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// The underlying key set
    pub fn jwks(&self) -> &JwkSet {
        &self.keys
    }
}
