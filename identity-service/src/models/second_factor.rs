use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// TOTP second factor, at most one per account. An unconfirmed factor
/// does not gate login.
#[derive(Debug, Clone, FromRow)]
pub struct SecondFactor {
    pub id: i64,
    pub account_id: i64,
    /// Base32-encoded shared secret; treated as opaque outside the
    /// two-factor service.
    pub secret: String,
    pub confirmed: bool,
    /// Highest 30-second time step already consumed by a successful
    /// verification.
    pub last_verified_step: i64,
    pub created_at: DateTime<Utc>,
}

/// One single-use recovery code, stored as an Argon2 hash.
#[derive(Debug, Clone, FromRow)]
pub struct RecoveryCode {
    pub id: i64,
    pub account_id: i64,
    pub code_hash: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}
