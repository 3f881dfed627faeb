use service_core::config::{get_env, get_env_parse};
use service_core::error::AppError;

/// Process-wide configuration built from the environment at startup.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub service_name: String,
    pub log_level: String,
    pub http_port: u16,
    pub rpc_port: u16,
    pub database_url: String,
    /// Read-only path where the identity service publishes its public
    /// key (shared volume). Tried before the HTTP fallback.
    pub idp_public_key_path: Option<String>,
    /// HTTP fallback for the verifying key.
    pub idp_public_key_url: Option<String>,
    pub internal_rpc_secret: String,
}

impl CatalogConfig {
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
            service_name: get_env("SERVICE_NAME", Some("catalog-service"))?,
            log_level: get_env("LOG_LEVEL", Some("info"))?,
            http_port: get_env_parse("HTTP_PORT", Some("8002"))?,
            rpc_port: get_env_parse("RPC_PORT", Some("50052"))?,
            database_url: get_env("DATABASE_URL", None)?,
            idp_public_key_path,
            idp_public_key_url,
            internal_rpc_secret: get_env("INTERNAL_RPC_SECRET", Some("dev-internal-secret"))?,
        })
    }
}
