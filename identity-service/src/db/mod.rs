//! Database access for identity-service.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use service_core::error::AppError;

use crate::models::{Account, RecoveryCode, SecondFactor};

/// Connection pool wrapper; all writes run in local transactions.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url))]
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("migration failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------

    #[instrument(skip(self, password_hash))]
    pub async fn create_account(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        password_algo: &str,
    ) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, email, password_hash, password_algo)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(password_algo)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::ConflictState(anyhow::anyhow!("username or email already in use"))
            }
            other => AppError::from(other),
        })?;

        info!(account_id = account.id, "Account created");
        Ok(account)
    }

    pub async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        let account =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(account)
    }

    pub async fn find_account_by_id(&self, id: i64) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Replace the password verifier and bump the token-version counter,
    /// invalidating every outstanding token for the account.
    #[instrument(skip(self, new_hash))]
    pub async fn update_password(&self, account_id: i64, new_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2,
                token_version = token_version + 1,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("account not found")));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Second factors
    // -------------------------------------------------------------------

    pub async fn confirmed_factor(
        &self,
        account_id: i64,
    ) -> Result<Option<SecondFactor>, AppError> {
        let factor = sqlx::query_as::<_, SecondFactor>(
            "SELECT * FROM second_factors WHERE account_id = $1 AND confirmed",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(factor)
    }

    pub async fn unconfirmed_factor(
        &self,
        account_id: i64,
    ) -> Result<Option<SecondFactor>, AppError> {
        let factor = sqlx::query_as::<_, SecondFactor>(
            "SELECT * FROM second_factors WHERE account_id = $1 AND NOT confirmed",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(factor)
    }

    /// Start (or restart) 2FA setup: discard any prior unconfirmed factor
    /// and all recovery codes, then store the new secret and code batch
    /// in one transaction.
    #[instrument(skip(self, secret, code_hashes))]
    pub async fn replace_unconfirmed_factor(
        &self,
        account_id: i64,
        secret: &str,
        code_hashes: &[String],
    ) -> Result<SecondFactor, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM second_factors WHERE account_id = $1 AND NOT confirmed")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recovery_codes WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        let factor = sqlx::query_as::<_, SecondFactor>(
            r#"
            INSERT INTO second_factors (account_id, secret)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(secret)
        .fetch_one(&mut *tx)
        .await?;

        for hash in code_hashes {
            sqlx::query("INSERT INTO recovery_codes (account_id, code_hash) VALUES ($1, $2)")
                .bind(account_id)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(factor)
    }

    /// Mark a factor confirmed, burning the step that proved possession
    /// so the same code cannot also complete a login. Returns false when
    /// the factor was already confirmed or does not exist.
    pub async fn confirm_factor(&self, factor_id: i64, step: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE second_factors
            SET confirmed = TRUE,
                last_verified_step = GREATEST(last_verified_step, $2)
            WHERE id = $1 AND NOT confirmed
            "#,
        )
        .bind(factor_id)
        .bind(step)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Remove the factor and every recovery code in one transaction.
    #[instrument(skip(self))]
    pub async fn delete_factor(&self, account_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM second_factors WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recovery_codes WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Advance the per-account TOTP step watermark. The guard
    /// `last_verified_step < $2` makes concurrent logins presenting the
    /// same code race to a single winner.
    pub async fn advance_totp_step(&self, account_id: i64, step: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE second_factors
            SET last_verified_step = $2
            WHERE account_id = $1 AND confirmed AND last_verified_step < $2
            "#,
        )
        .bind(account_id)
        .bind(step)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // -------------------------------------------------------------------
    // Recovery codes
    // -------------------------------------------------------------------

    pub async fn unused_recovery_codes(
        &self,
        account_id: i64,
    ) -> Result<Vec<RecoveryCode>, AppError> {
        let codes = sqlx::query_as::<_, RecoveryCode>(
            "SELECT * FROM recovery_codes WHERE account_id = $1 AND NOT used ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Consume one code. Returns false when another login already used
    /// it, which enforces single use under concurrency.
    pub async fn mark_recovery_code_used(&self, code_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE recovery_codes SET used = TRUE WHERE id = $1 AND NOT used")
            .bind(code_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count_unused_recovery_codes(&self, account_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recovery_codes WHERE account_id = $1 AND NOT used",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Atomically invalidate the old batch and store a new one.
    #[instrument(skip(self, code_hashes))]
    pub async fn replace_recovery_codes(
        &self,
        account_id: i64,
        code_hashes: &[String],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recovery_codes WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        for hash in code_hashes {
            sqlx::query("INSERT INTO recovery_codes (account_id, code_hash) VALUES ($1, $2)")
                .bind(account_id)
                .bind(hash)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
