use std::time::Duration;

use base64::Engine;

use service_core::config::{get_env, get_env_parse};
use service_core::error::AppError;
use service_core::grpc::{RetryConfig, RpcClientConfig};

/// Process-wide configuration built from the environment at startup.
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub service_name: String,
    pub log_level: String,
    pub http_port: u16,
    pub database_url: String,
    pub idp_public_key_path: Option<String>,
    pub idp_public_key_url: Option<String>,
    pub internal_rpc_secret: String,
    /// 32-byte AES-256 key for field-level encryption of the owner id.
    pub field_encryption_key: [u8; 32],
    pub identity_rpc_url: String,
    pub catalog_rpc_url: String,
    pub circuit_fail_threshold: u32,
    pub circuit_reset_seconds: u64,
    pub retry_max_attempts: u32,
    pub retry_base_seconds: u64,
    pub retry_cap_seconds: u64,
    pub rpc_deadline_seconds: u64,
}

impl OrderConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let key_dir = get_env("KEY_DIR", Some(""))?;
        let idp_public_key_path = if key_dir.is_empty() {
            None
        } else {
            Some(format!("{}/jwt_public.pem", key_dir.trim_end_matches('/')))
        };

        let idp_public_key_url = match get_env("IDP_PUBLIC_KEY_URL", Some(""))? {
            url if url.is_empty() => None,
            url => Some(url),
        };

        if idp_public_key_path.is_none() && idp_public_key_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "at least one of KEY_DIR and IDP_PUBLIC_KEY_URL must be set"
            )));
        }

        Ok(Self {
            service_name: get_env("SERVICE_NAME", Some("order-service"))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            http_port: get_env_parse("HTTP_PORT", Some("8003"))?,
            database_url: get_env("DATABASE_URL", None)?,
            idp_public_key_path,
            idp_public_key_url,
            internal_rpc_secret: get_env("INTERNAL_RPC_SECRET", Some("dev-internal-secret"))?,
            field_encryption_key: parse_encryption_key(&get_env("FIELD_ENCRYPTION_KEY", None)?)?,
            identity_rpc_url: get_env("IDENTITY_RPC_URL", Some("http://localhost:50051"))?,
            catalog_rpc_url: get_env("CATALOG_RPC_URL", Some("http://localhost:50052"))?,
            circuit_fail_threshold: get_env_parse("CIRCUIT_FAIL_THRESHOLD", Some("5"))?,
            circuit_reset_seconds: get_env_parse("CIRCUIT_RESET_SECONDS", Some("30"))?,
            retry_max_attempts: get_env_parse("RETRY_MAX_ATTEMPTS", Some("3"))?,
            retry_base_seconds: get_env_parse("RETRY_BASE_SECONDS", Some("1"))?,
            retry_cap_seconds: get_env_parse("RETRY_CAP_SECONDS", Some("10"))?,
            rpc_deadline_seconds: get_env_parse("RPC_DEADLINE_SECONDS", Some("5"))?,
        })
    }

    /// Client settings for one dependency endpoint.
    pub fn rpc_client_config(&self, endpoint: &str) -> RpcClientConfig {
        RpcClientConfig {
            endpoint: endpoint.to_string(),
            service_secret: self.internal_rpc_secret.clone(),
            requesting_service: self.service_name.clone(),
            deadline: Duration::from_secs(self.rpc_deadline_seconds),
            retry: RetryConfig {
                max_attempts: self.retry_max_attempts,
                base: Duration::from_secs(self.retry_base_seconds),
                cap: Duration::from_secs(self.retry_cap_seconds),
            },
            breaker_threshold: self.circuit_fail_threshold,
            breaker_reset: Duration::from_secs(self.circuit_reset_seconds),
        }
    }
}

/// Accept the key as standard base64 of 32 bytes, or as a raw 32-byte
/// string for development setups.
fn parse_encryption_key(raw: &str) -> Result<[u8; 32], AppError> {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(raw) {
        Ok(decoded) if decoded.len() == 32 => decoded,
        _ if raw.len() == 32 => raw.as_bytes().to_vec(),
        _ => {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "FIELD_ENCRYPTION_KEY must be 32 bytes (raw or base64-encoded)"
            )));
        }
    };

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_raw_32_byte_key() {
        let key = parse_encryption_key("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(&key[..4], b"0123");
    }

    #[test]
    fn accepts_base64_key() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        let key = parse_encryption_key(&encoded).unwrap();
        assert_eq!(key, [7u8; 32]);
    }

    #[test]
    fn rejects_short_keys() {
        assert!(parse_encryption_key("too-short").is_err());
    }
}
