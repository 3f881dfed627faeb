//! Token verification library shared by every service that consumes
//! identity-service tokens.
//!
//! Verification is fully local: the RSA public key published by
//! identity-service is acquired once at startup (filesystem first, HTTP
//! fallback) and cached in memory by key id. No database or network call
//! happens on the per-request verify path.

mod keys;
mod middleware;
mod verifier;

use serde::{Deserialize, Serialize};

pub use keys::{key_id_for_pem, KeyStore, KeyStoreConfig};
pub use middleware::{require_auth, AdminCaller, Caller};
pub use verifier::TokenVerifier;

/// The only signing algorithm this system accepts.
pub const TOKEN_ALGORITHM: &str = "RS256";

/// Kind discriminator carried in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id, rendered as a string.
    pub sub: String,
    pub username: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expires-at (unix seconds).
    pub exp: i64,
    pub kind: TokenKind,
    /// Copy of the account's token-version counter at issuance.
    pub ver: i32,
    /// Unique token id.
    pub jti: String,
    #[serde(default)]
    pub admin: bool,
}

impl Claims {
    /// Parse the subject claim into the numeric account id.
    pub fn subject_id(&self) -> Result<i64, crate::AppError> {
        self.sub.parse().map_err(|_| {
            crate::AppError::AuthInvalid(anyhow::anyhow!("subject claim is not an account id"))
        })
    }
}

/// The capability handed to request handlers after successful
/// verification. Carries only what authorization decisions need.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub subject: i64,
    pub username: String,
    pub is_admin: bool,
    /// Expiry of the presented token (unix seconds).
    pub expires_at: i64,
}
