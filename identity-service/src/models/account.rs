use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Account row. The password verifier never leaves this service; every
/// outward-facing response uses [`SafeAccount`].
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_algo: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn sanitized(&self) -> SafeAccount {
        SafeAccount {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_active: self.is_active,
            is_admin: self.is_admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Account projection safe for API responses: no verifier, no token
/// version.
#[derive(Debug, Clone, Serialize)]
pub struct SafeAccount {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
