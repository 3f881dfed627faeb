use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::AppError;

/// Derive the opaque key id for a PEM-encoded public key.
///
/// Both the issuing and the verifying side derive the id the same way, so
/// a key published through the filesystem carries the same id as one
/// fetched over HTTP.
pub fn key_id_for_pem(pem: &str) -> String {
    let digest = Sha256::digest(pem.trim().as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// How a service locates the identity-service verifying key.
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    /// Filesystem location published by identity-service
    /// (`$KEY_DIR/jwt_public.pem`), tried first.
    pub public_key_path: Option<PathBuf>,
    /// HTTP fallback (`GET /auth/public-key` on identity-service).
    pub public_key_url: Option<String>,
    /// How long to keep polling at startup before giving up.
    pub startup_timeout: Duration,
    /// How long a cached key set is trusted before a background refresh.
    pub refresh_interval: Duration,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            public_key_path: None,
            public_key_url: None,
            startup_timeout: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Response shape of the identity-service public-key endpoint.
#[derive(Debug, Deserialize)]
struct PublicKeyDocument {
    public_key: String,
    algorithm: String,
    key_id: String,
}

struct CachedKeys {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
}

/// In-memory cache of parsed verifying keys, keyed by key id.
///
/// Readers are never blocked by a refresh: the last-known-good key set is
/// served while a replacement set is being fetched, and the write lock is
/// held only for the swap.
pub struct KeyStore {
    config: KeyStoreConfig,
    http: reqwest::Client,
    cache: RwLock<CachedKeys>,
}

impl KeyStore {
    /// Acquire the verifying key at startup.
    ///
    /// Tries the filesystem path first, then polls the HTTP endpoint with
    /// bounded backoff until a key is obtained or `startup_timeout`
    /// elapses. Failure here must abort service startup.
    pub async fn acquire(config: KeyStoreConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::new();
        let deadline = Instant::now() + config.startup_timeout;
        let mut backoff = Duration::from_millis(500);

        loop {
            match Self::load_keys(&config, &http).await {
                Ok(by_kid) if !by_kid.is_empty() => {
                    tracing::info!(
                        key_ids = ?by_kid.keys().collect::<Vec<_>>(),
                        "Verifying key acquired"
                    );
                    return Ok(Self {
                        config,
                        http,
                        cache: RwLock::new(CachedKeys {
                            by_kid,
                            fetched_at: Instant::now(),
                        }),
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "Verifying key not yet available");
                }
            }

            if Instant::now() + backoff > deadline {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "failed to obtain a verifying key within {:?}",
                    config.startup_timeout
                )));
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(5));
        }
    }

    /// Build a key store directly from a PEM string. Used by
    /// identity-service itself (which holds the key pair locally) and by
    /// tests.
    pub fn from_pem(pem: &str) -> Result<Self, AppError> {
        let kid = key_id_for_pem(pem);
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("invalid public key PEM: {}", e)))?;

        let mut by_kid = HashMap::new();
        by_kid.insert(kid, Arc::new(key));

        Ok(Self {
            config: KeyStoreConfig::default(),
            http: reqwest::Client::new(),
            cache: RwLock::new(CachedKeys {
                by_kid,
                fetched_at: Instant::now(),
            }),
        })
    }

    async fn load_keys(
        config: &KeyStoreConfig,
        http: &reqwest::Client,
    ) -> Result<HashMap<String, Arc<DecodingKey>>, AppError> {
        let mut by_kid = HashMap::new();

        if let Some(path) = &config.public_key_path {
            match tokio::fs::read_to_string(path).await {
                Ok(pem) => {
                    let kid = key_id_for_pem(&pem);
                    let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "public key at {} is not valid PEM: {}",
                            path.display(),
                            e
                        ))
                    })?;
                    by_kid.insert(kid, Arc::new(key));
                    return Ok(by_kid);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "failed to read {}: {}",
                        path.display(),
                        err
                    )));
                }
            }
        }

        if let Some(url) = &config.public_key_url {
            let doc: PublicKeyDocument = http
                .get(url)
                .send()
                .await
                .map_err(|e| AppError::DependencyUnavailable(format!("key fetch: {}", e)))?
                .error_for_status()
                .map_err(|e| AppError::DependencyUnavailable(format!("key fetch: {}", e)))?
                .json()
                .await
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("key endpoint returned bad JSON: {}", e))
                })?;

            if doc.algorithm != super::TOKEN_ALGORITHM {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "key endpoint advertises unsupported algorithm {:?}",
                    doc.algorithm
                )));
            }

            let key = DecodingKey::from_rsa_pem(doc.public_key.as_bytes()).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("fetched public key is not valid PEM: {}", e))
            })?;
            by_kid.insert(doc.key_id, Arc::new(key));
        }

        Ok(by_kid)
    }

    /// Look up a verifying key by key id.
    ///
    /// An unknown kid triggers one immediate refresh before the final
    /// rejection, so a freshly rotated key is picked up without waiting
    /// for the periodic refresh.
    pub async fn get(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        if self.refresh_due().await {
            self.refresh().await;
        }

        if let Some(key) = self.cache.read().await.by_kid.get(kid) {
            return Ok(key.clone());
        }

        self.refresh().await;

        self.cache
            .read()
            .await
            .by_kid
            .get(kid)
            .cloned()
            .ok_or_else(|| AppError::AuthInvalid(anyhow::anyhow!("unknown key id {:?}", kid)))
    }

    async fn refresh_due(&self) -> bool {
        self.cache.read().await.fetched_at.elapsed() >= self.config.refresh_interval
    }

    /// Re-fetch the key set. Last-known-good keys are kept on failure.
    async fn refresh(&self) {
        match Self::load_keys(&self.config, &self.http).await {
            Ok(by_kid) if !by_kid.is_empty() => {
                let mut cache = self.cache.write().await;
                cache.by_kid = by_kid;
                cache.fetched_at = Instant::now();
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Key refresh failed, serving last known keys");
            }
        }
    }

    /// Key ids currently cached, for diagnostics.
    pub async fn key_ids(&self) -> Vec<String> {
        self.cache.read().await.by_kid.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nMIIBIjAN\n-----END PUBLIC KEY-----";

    #[test]
    fn key_id_is_deterministic() {
        assert_eq!(key_id_for_pem(PEM), key_id_for_pem(PEM));
        assert_eq!(key_id_for_pem(PEM).len(), 16);
    }

    #[test]
    fn key_id_ignores_surrounding_whitespace() {
        let padded = format!("\n{}\n\n", PEM);
        assert_eq!(key_id_for_pem(PEM), key_id_for_pem(&padded));
    }

    #[test]
    fn distinct_keys_get_distinct_ids() {
        let other = PEM.replace("MIIBIjAN", "MIIBIjAM");
        assert_ne!(key_id_for_pem(PEM), key_id_for_pem(&other));
    }
}
