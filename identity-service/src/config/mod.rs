use service_core::config::{get_env, get_env_parse};
use service_core::error::AppError;

/// Process-wide configuration, built once at startup from the
/// environment and passed into each component explicitly.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub service_name: String,
    pub log_level: String,
    pub http_port: u16,
    pub rpc_port: u16,
    pub database_url: String,
    /// Directory holding the RSA key pair; the public half is published
    /// at `$KEY_DIR/jwt_public.pem` for dependent services.
    pub key_dir: String,
    /// Access-token lifetime in seconds.
    pub access_token_ttl: i64,
    /// Refresh-token lifetime in seconds.
    pub refresh_token_ttl: i64,
    /// Bearer credential expected on internal RPC calls (development
    /// only; production replaces this with mTLS identities).
    pub internal_rpc_secret: String,
    /// Issuer label baked into TOTP provisioning URIs.
    pub totp_issuer: String,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let config = Self {
            service_name: get_env("SERVICE_NAME", Some("identity-service"))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            http_port: get_env_parse("HTTP_PORT", Some("8001"))?,
            rpc_port: get_env_parse("RPC_PORT", Some("50051"))?,
            database_url: get_env("DATABASE_URL", None)?,
            key_dir: get_env("KEY_DIR", Some("./keys"))?,
            access_token_ttl: get_env_parse("ACCESS_TOKEN_TTL", Some("900"))?,
            refresh_token_ttl: get_env_parse("REFRESH_TOKEN_TTL", Some("86400"))?,
            internal_rpc_secret: get_env("INTERNAL_RPC_SECRET", Some("dev-internal-secret"))?,
            totp_issuer: get_env("TOTP_ISSUER", Some("storefront"))?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.access_token_ttl <= 0 || self.access_token_ttl > 900 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_TOKEN_TTL must be in (0, 900] seconds"
            )));
        }
        if self.refresh_token_ttl <= 0 || self.refresh_token_ttl > 86_400 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REFRESH_TOKEN_TTL must be in (0, 86400] seconds"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_access_ttl() {
        let config = IdentityConfig {
            service_name: "identity-service".into(),
            log_level: "info".into(),
            http_port: 8001,
            rpc_port: 50051,
            database_url: "postgres://localhost/identity".into(),
            key_dir: "./keys".into(),
            access_token_ttl: 3600,
            refresh_token_ttl: 86_400,
            internal_rpc_secret: "secret".into(),
            totp_issuer: "storefront".into(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_default_ttls() {
        let config = IdentityConfig {
            service_name: "identity-service".into(),
            log_level: "info".into(),
            http_port: 8001,
            rpc_port: 50051,
            database_url: "postgres://localhost/identity".into(),
            key_dir: "./keys".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 86_400,
            internal_rpc_secret: "secret".into(),
            totp_issuer: "storefront".into(),
        };
        assert!(config.validate().is_ok());
    }
}
