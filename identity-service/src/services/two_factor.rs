//! Two-factor authentication: TOTP second factors and single-use
//! recovery codes.

use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use totp_rs::{Algorithm, Secret, TOTP};

use service_core::error::AppError;

use crate::db::Database;
use crate::models::Account;
use crate::utils::password::{hash_password, verify_password};

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
/// Accepted clock drift, in steps, on either side of now.
const TOTP_SKEW: i64 = 1;

const RECOVERY_CODE_COUNT: usize = 10;
/// 16 random bytes = 128 bits of entropy per code.
const RECOVERY_CODE_BYTES: usize = 16;

/// Returned once from setup; the secret and codes are never shown again.
#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    pub recovery_codes: Vec<String>,
}

/// How a login's second step was satisfied.
#[derive(Debug, PartialEq, Eq)]
pub enum SecondStep {
    Totp,
    RecoveryCode { remaining: i64 },
}

#[derive(Clone)]
pub struct TwoFactorService {
    db: Database,
    issuer: String,
}

impl TwoFactorService {
    pub fn new(db: Database, issuer: String) -> Self {
        Self { db, issuer }
    }

    pub async fn is_enabled(&self, account_id: i64) -> Result<bool, AppError> {
        Ok(self.db.confirmed_factor(account_id).await?.is_some())
    }

    /// Begin setup: generate a fresh secret and recovery-code batch,
    /// replacing any prior unconfirmed factor. Rejected when a confirmed
    /// factor already exists.
    pub async fn begin_setup(&self, account: &Account) -> Result<SetupResponse, AppError> {
        if self.db.confirmed_factor(account.id).await?.is_some() {
            return Err(AppError::ConflictState(anyhow::anyhow!(
                "two-factor authentication is already enabled"
            )));
        }

        let secret = Secret::generate_secret();
        let secret_base32 = secret.to_encoded().to_string();

        let totp = build_totp(
            &secret_base32,
            TOTP_SKEW as u8,
            Some(self.issuer.clone()),
            account.username.clone(),
        )?;
        let otpauth_url = totp.get_url();

        let (plain_codes, hashed_codes) = generate_recovery_codes()?;

        self.db
            .replace_unconfirmed_factor(account.id, &secret_base32, &hashed_codes)
            .await?;

        tracing::info!(account_id = account.id, "Two-factor setup started");

        Ok(SetupResponse {
            secret: secret_base32,
            otpauth_url,
            recovery_codes: plain_codes,
        })
    }

    /// Confirm setup with a current TOTP code. Marks the factor
    /// confirmed and burns the matched step so the same code cannot also
    /// complete a login.
    pub async fn confirm_setup(&self, account: &Account, code: &str) -> Result<(), AppError> {
        let factor = self.db.unconfirmed_factor(account.id).await?.ok_or_else(|| {
            AppError::ConflictState(anyhow::anyhow!("no pending two-factor setup"))
        })?;

        let now = Utc::now().timestamp();
        let step = matched_step(&factor.secret, code, now)?.ok_or(AppError::TwoFactorInvalid)?;

        if !self.db.confirm_factor(factor.id, step).await? {
            return Err(AppError::ConflictState(anyhow::anyhow!(
                "two-factor setup already confirmed"
            )));
        }

        tracing::info!(account_id = account.id, "Two-factor authentication enabled");
        Ok(())
    }

    /// Second login step: accept a current TOTP code or an unused
    /// recovery code. Replays of either are rejected; the winning code is
    /// consumed in the same statement that decides the race.
    pub async fn verify_login(&self, account: &Account, code: &str) -> Result<SecondStep, AppError> {
        let factor = self.db.confirmed_factor(account.id).await?.ok_or_else(|| {
            AppError::ConflictState(anyhow::anyhow!(
                "two-factor authentication is not enabled for this account"
            ))
        })?;

        let now = Utc::now().timestamp();
        if let Some(step) = matched_step(&factor.secret, code, now)? {
            if self.db.advance_totp_step(account.id, step).await? {
                return Ok(SecondStep::Totp);
            }
            // Valid code, but its step was already consumed: replay.
            return Err(AppError::TwoFactorInvalid);
        }

        for candidate in self.db.unused_recovery_codes(account.id).await? {
            if verify_password(code, &candidate.code_hash).is_ok() {
                if self.db.mark_recovery_code_used(candidate.id).await? {
                    let remaining = self.db.count_unused_recovery_codes(account.id).await?;
                    tracing::info!(
                        account_id = account.id,
                        remaining,
                        "Login completed with a recovery code"
                    );
                    return Ok(SecondStep::RecoveryCode { remaining });
                }
                return Err(AppError::TwoFactorInvalid);
            }
        }

        Err(AppError::TwoFactorInvalid)
    }

    /// Disable 2FA; requires password confirmation.
    pub async fn disable(&self, account: &Account, password: &str) -> Result<(), AppError> {
        verify_password(password, &account.password_hash)?;

        if self.db.confirmed_factor(account.id).await?.is_none() {
            return Err(AppError::ConflictState(anyhow::anyhow!(
                "two-factor authentication is not enabled"
            )));
        }

        self.db.delete_factor(account.id).await?;
        tracing::info!(account_id = account.id, "Two-factor authentication disabled");
        Ok(())
    }

    /// Regenerate the recovery-code batch; the old batch is invalidated
    /// atomically. Requires password confirmation.
    pub async fn regenerate_codes(
        &self,
        account: &Account,
        password: &str,
    ) -> Result<Vec<String>, AppError> {
        verify_password(password, &account.password_hash)?;

        if self.db.confirmed_factor(account.id).await?.is_none() {
            return Err(AppError::ConflictState(anyhow::anyhow!(
                "two-factor authentication is not enabled"
            )));
        }

        let (plain_codes, hashed_codes) = generate_recovery_codes()?;
        self.db
            .replace_recovery_codes(account.id, &hashed_codes)
            .await?;

        tracing::info!(account_id = account.id, "Recovery codes regenerated");
        Ok(plain_codes)
    }
}

/// Build the downloadable artifact for a set of just-generated codes.
pub fn download_artifact(username: &str, codes: &[String]) -> (String, String) {
    let mut text = format!("Recovery codes for {}\n\n", username);
    for code in codes {
        text.push_str(code);
        text.push('\n');
    }
    text.push_str("\nEach code can be used exactly once in place of an authenticator code.\n");

    let content = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    (format!("{}-recovery-codes.txt", username), content)
}

fn build_totp(
    secret_base32: &str,
    skew: u8,
    issuer: Option<String>,
    account_name: String,
) -> Result<TOTP, AppError> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("invalid TOTP secret: {:?}", e)))?;

    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        skew,
        TOTP_STEP,
        secret_bytes,
        issuer,
        account_name,
    )
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("failed to build TOTP: {}", e)))
}

/// Find which time step (if any) within ±1 of `now` the code is valid
/// for. Returning the step lets the caller enforce replay rejection at
/// step granularity.
fn matched_step(secret_base32: &str, code: &str, now: i64) -> Result<Option<i64>, AppError> {
    // Skew 0 here: drift tolerance comes from probing the neighbors
    // explicitly, so the matched step is known exactly.
    let totp = build_totp(secret_base32, 0, None, String::new())?;

    for offset in [-TOTP_SKEW, 0, TOTP_SKEW] {
        let t = now + offset * TOTP_STEP as i64;
        if t < 0 {
            continue;
        }
        if totp.check(code, t as u64) {
            return Ok(Some(t / TOTP_STEP as i64));
        }
    }

    Ok(None)
}

/// Generate one batch of high-entropy recovery codes, returning the
/// plaintexts (shown once) and their Argon2 hashes (stored).
fn generate_recovery_codes() -> Result<(Vec<String>, Vec<String>), AppError> {
    let mut plain = Vec::with_capacity(RECOVERY_CODE_COUNT);
    let mut hashed = Vec::with_capacity(RECOVERY_CODE_COUNT);

    for _ in 0..RECOVERY_CODE_COUNT {
        let mut bytes = [0u8; RECOVERY_CODE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let code: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

        hashed.push(hash_password(&code)?);
        plain.push(code);
    }

    Ok((plain, hashed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    fn code_at(secret_base32: &str, time: i64) -> String {
        let totp = build_totp(secret_base32, 0, None, String::new()).unwrap();
        totp.generate(time as u64)
    }

    #[test]
    fn current_code_matches_its_step() {
        let s = secret();
        let now = 1_700_000_010;
        let code = code_at(&s, now);
        assert_eq!(matched_step(&s, &code, now).unwrap(), Some(now / 30));
    }

    #[test]
    fn drift_of_one_step_is_tolerated() {
        let s = secret();
        let now = 1_700_000_010;

        let previous = code_at(&s, now - 30);
        assert_eq!(
            matched_step(&s, &previous, now).unwrap(),
            Some((now - 30) / 30)
        );

        let next = code_at(&s, now + 30);
        assert_eq!(matched_step(&s, &next, now).unwrap(), Some((now + 30) / 30));
    }

    #[test]
    fn drift_of_two_steps_is_rejected() {
        let s = secret();
        let now = 1_700_000_010;
        let stale = code_at(&s, now - 90);
        assert_eq!(matched_step(&s, &stale, now).unwrap(), None);
    }

    #[test]
    fn wrong_code_matches_nothing() {
        let s = secret();
        assert_eq!(matched_step(&s, "000000", 1_700_000_010).unwrap(), None);
    }

    #[test]
    fn recovery_codes_are_high_entropy_and_hashed() {
        let (plain, hashed) = generate_recovery_codes().unwrap();
        assert_eq!(plain.len(), RECOVERY_CODE_COUNT);
        assert_eq!(hashed.len(), RECOVERY_CODE_COUNT);

        for (code, hash) in plain.iter().zip(&hashed) {
            // 32 hex chars = 128 bits.
            assert_eq!(code.len(), RECOVERY_CODE_BYTES * 2);
            assert!(hash.starts_with("$argon2id$"));
            assert!(verify_password(code, hash).is_ok());
        }

        // No duplicates within a batch.
        let mut unique = plain.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), RECOVERY_CODE_COUNT);
    }

    #[test]
    fn provisioning_url_carries_issuer_and_account() {
        let s = secret();
        let totp = build_totp(&s, 1, Some("storefront".into()), "alice".into()).unwrap();
        let url = totp.get_url();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("storefront"));
        assert!(url.contains("alice"));
    }

    #[test]
    fn download_artifact_is_base64_text() {
        let codes = vec!["aabb".to_string(), "ccdd".to_string()];
        let (filename, content) = download_artifact("alice", &codes);
        assert_eq!(filename, "alice-recovery-codes.txt");

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(content)
            .unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.contains("aabb"));
        assert!(text.contains("ccdd"));
    }
}
