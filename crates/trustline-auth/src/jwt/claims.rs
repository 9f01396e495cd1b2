//! Claim sets, one type per JWT payload kind
//!
//! Outbound payloads ([`ClientAssertionClaims`], [`RequestObjectClaims`]) carry
//! exactly the fields the provider expects. Inbound payloads
//! ([`AccessTokenClaims`], [`IdTokenClaims`]) share [`RegisteredClaims`] and
//! add what each token kind is checked for.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// NumericDate (RFC 7519 §2): integer or fractional seconds, truncated
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericDate {
        Whole(i64),
        Fractional(f64),
    }

    Ok(Option::<NumericDate>::deserialize(deserializer)?.map(|date| match date {
        NumericDate::Whole(secs) => secs,
        NumericDate::Fractional(secs) => secs.trunc() as i64,
    }))
}

/// Strings as-is, numbers in their JSON form, anything else dropped
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    })
}

/// The `aud` claim, which providers emit either as a string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "api"`
    Single(String),
    /// `"aud": ["api", "other"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// All audience values
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multiple(values) => values,
        }
    }

    /// Number of audience values
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// True when the claim is an empty array
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Whether `audience` is one of the values
    pub fn contains(&self, audience: &str) -> bool {
        self.as_slice().iter().any(|value| value == audience)
    }
}

/// The `scope` claim, either space-delimited or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeList {
    /// `"scope": "a b c"`
    Delimited(String),
    /// `"scope": ["a", "b", "c"]`
    List(Vec<String>),
}

impl ScopeList {
    /// Iterate over individual scope values
    pub fn iter(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Delimited(value) => Box::new(value.split_whitespace()),
            Self::List(values) => Box::new(values.iter().map(String::as_str)),
        }
    }

    /// Exact membership test
    pub fn contains(&self, scope: &str) -> bool {
        self.iter().any(|value| value == scope)
    }
}

/// Registered claims (RFC 7519 §4.1) read from inbound tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, deserialize_with = "numeric_date", skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date", skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date", skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Claims of a validated inbound access token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl AccessTokenClaims {
    /// Whether the token grants `scope`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.as_ref().is_some_and(|s| s.contains(scope))
    }
}

/// Claims of a verified ID token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Client authentication assertion (`private_key_jwt`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub jti: String,
    pub nbf: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Signed authorization request parameters (JAR)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestObjectClaims {
    pub jti: String,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub client_id: String,
    pub aud: String,
    pub response_type: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub nonce: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

/// Identity-proofing claims an access token may carry
///
/// Extraction is best effort and per field: a numeric value is kept in its
/// JSON form, and an absent or otherwise typed claim leaves only that field
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(deserialize_with = "lenient_string", rename = "helseid://claims/identity/assurance_level", default)]
    pub assurance_level: Option<String>,
    #[serde(deserialize_with = "lenient_string", rename = "helseid://claims/identity/security_level", default)]
    pub security_level: Option<String>,
    #[serde(deserialize_with = "lenient_string", rename = "helseid://claims/identity/pid", default)]
    pub pid: Option<String>,
    #[serde(deserialize_with = "lenient_string", rename = "helseid://claims/hpr/hpr_number", default)]
    pub hpr_number: Option<String>,
    #[serde(deserialize_with = "lenient_string", rename = "helseid://claims/client/claims/orgnr_parent", default)]
    pub orgnr_parent: Option<String>,
    #[serde(deserialize_with = "lenient_string", rename = "helseid://claims/client/claims/orgnr_child", default)]
    pub orgnr_child: Option<String>,
}

/// Optional identity-assurance requirements for the resource server
///
/// Not enforced unless attached with
/// [`BearerValidator::with_assurance_policy`](super::BearerValidator::with_assurance_policy).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssurancePolicy {
    /// Exact `assurance_level` value required, e.g. `"high"`
    #[serde(default)]
    pub required_assurance_level: Option<String>,
    /// Minimum numeric `security_level`, e.g. `4`
    #[serde(default)]
    pub minimum_security_level: Option<u8>,
}

impl AssurancePolicy {
    /// Check the identity claims against this policy
    ///
    /// # Errors
    ///
    /// Returns a description of the first unmet requirement.
    pub fn check(&self, identity: &IdentityClaims) -> Result<(), String> {
        if let Some(required) = &self.required_assurance_level {
            let actual = identity.assurance_level.as_deref().unwrap_or_default();
            if actual != required {
                return Err(format!(
                    "authenticated with assurance level: {actual:?}, requires: {required:?}"
                ));
            }
        }

        if let Some(minimum) = self.minimum_security_level {
            // Unparsable levels count as zero
            let actual = identity
                .security_level
                .as_deref()
                .and_then(|level| level.parse::<u8>().ok())
                .unwrap_or(0);
            if actual < minimum {
                return Err(format!(
                    "authenticated with security level: {actual}, requires: {minimum}"
                ));
            }
        }

        Ok(())
    }
}
