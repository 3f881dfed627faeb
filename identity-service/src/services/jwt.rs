use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use service_core::auth::{Claims, TokenKind};
use service_core::error::AppError;

use crate::models::Account;
use crate::services::keys::KeyMaterial;

/// Token issuance. Signing is pinned to RS256; the key id rides in the
/// header so dependents can select the right verifying key.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    key_id: String,
    access_ttl: i64,
    refresh_ttl: i64,
}

/// Token pair handed to clients after a completed login.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub token_type: &'static str,
    /// Access-token lifetime in seconds, for proactive refresh.
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(material: &KeyMaterial, access_ttl: i64, refresh_ttl: i64) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_rsa_pem(material.private_pem.as_bytes())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("invalid private key: {}", e)))?;

        tracing::info!(key_id = %material.key_id, "JWT service initialized with RS256 key");

        Ok(Self {
            encoding_key,
            key_id: material.key_id.clone(),
            access_ttl,
            refresh_ttl,
        })
    }

    /// Issue an access + refresh pair for a fully authenticated account.
    pub fn issue_pair(&self, account: &Account) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.issue(account, TokenKind::Access)?,
            refresh: self.issue(account, TokenKind::Refresh)?,
            token_type: "Bearer",
            expires_in: self.access_ttl,
        })
    }

    fn issue(&self, account: &Account, kind: TokenKind) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            iat: now,
            exp: now + ttl,
            kind,
            ver: account.token_version,
            jti: Uuid::new_v4().to_string(),
            admin: account.is_admin,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("token encoding failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::keys::generate_keypair;
    use chrono::{DateTime, Utc};
    use service_core::auth::{KeyStore, TokenVerifier};
    use std::sync::Arc;

    fn account() -> Account {
        let now: DateTime<Utc> = Utc::now();
        Account {
            id: 42,
            username: "alice".into(),
            email: "a@x".into(),
            password_hash: "$argon2id$irrelevant".into(),
            password_algo: "argon2id".into(),
            is_active: true,
            is_admin: false,
            token_version: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn issued_pair_verifies_under_the_published_key() {
        let material = generate_keypair(2048).unwrap();
        let jwt = JwtService::new(&material, 900, 86_400).unwrap();

        let pair = jwt.issue_pair(&account()).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let verifier =
            TokenVerifier::new(Arc::new(KeyStore::from_pem(&material.public_pem).unwrap()));

        let caller = verifier.verify_access(&pair.access).await.unwrap();
        assert_eq!(caller.subject, 42);
        assert_eq!(caller.username, "alice");

        let refresh_claims = verifier
            .verify(&pair.refresh, TokenKind::Refresh)
            .await
            .unwrap();
        assert_eq!(refresh_claims.ver, 3);
        assert_eq!(refresh_claims.sub, "42");
    }

    #[tokio::test]
    async fn access_and_refresh_kinds_are_not_interchangeable() {
        let material = generate_keypair(2048).unwrap();
        let jwt = JwtService::new(&material, 900, 86_400).unwrap();
        let pair = jwt.issue_pair(&account()).unwrap();

        let verifier =
            TokenVerifier::new(Arc::new(KeyStore::from_pem(&material.public_pem).unwrap()));

        assert!(verifier.verify_access(&pair.refresh).await.is_err());
        assert!(verifier
            .verify(&pair.access, TokenKind::Refresh)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn tokens_issued_under_one_key_fail_under_another() {
        let material_a = generate_keypair(2048).unwrap();
        let material_b = generate_keypair(2048).unwrap();
        let jwt = JwtService::new(&material_a, 900, 86_400).unwrap();
        let pair = jwt.issue_pair(&account()).unwrap();

        let verifier =
            TokenVerifier::new(Arc::new(KeyStore::from_pem(&material_b.public_pem).unwrap()));
        assert!(verifier.verify_access(&pair.access).await.is_err());
    }
}
