//! JWT infrastructure shared by both sides of the trust triangle
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          JWT Infrastructure              │
//! │  - typed claim sets per payload kind     │
//! │  - PS256 signer (client side)            │
//! │  - key set with collect-and-skip parsing │
//! │  - zero-leeway verification              │
//! └──────────────────────────────────────────┘
//!        ▲                         ▲
//!        │                         │
//!  ┌─────┴───────┐        ┌────────┴────────┐
//!  │ Assertions  │        │ Bearer / ID     │
//!  │ and JAR     │        │ token checks    │
//!  └─────────────┘        └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - `claims` - Audience/scope encodings and one claim type per payload kind
//! - `jwks` - Key set parsed key by key
//! - `signer` - PS256 signing with an injected RSA private key
//! - `validator` - Signature and claim verification for access and ID tokens

pub mod claims;
pub mod jwks;
pub mod signer;
pub mod validator;

pub use claims::{
    AccessTokenClaims, AssurancePolicy, Audience, ClientAssertionClaims, IdTokenClaims,
    IdentityClaims, RegisteredClaims, RequestObjectClaims, ScopeList,
};
pub use jwks::KeySet;
pub use signer::{JwtSigner, SigningError};
pub use validator::{
    BearerValidator, IdTokenVerifier, ValidatedToken, ValidationError, VerifiedIdToken,
    extract_bearer,
};
