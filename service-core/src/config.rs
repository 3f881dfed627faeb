//! Environment-based configuration helpers.
//!
//! Each service builds an explicit config struct at startup from these
//! helpers; there is no ambient global settings object. A missing required
//! key is a startup failure (non-zero exit), never a silent default.

use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Read an environment variable, falling back to `default` when unset.
/// Returns a configuration error when the key is required (no default)
/// and absent.
pub fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

/// Read and parse an environment variable.
pub fn get_env_parse<T>(key: &str, default: Option<&str>) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default)?;
    raw.parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_applies_when_unset() {
        let val = get_env("SERVICE_CORE_TEST_UNSET_KEY", Some("fallback")).unwrap();
        assert_eq!(val, "fallback");
    }

    #[test]
    fn missing_required_key_is_a_config_error() {
        let err = get_env("SERVICE_CORE_TEST_MISSING_KEY", None).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn parse_failure_is_a_config_error() {
        std::env::set_var("SERVICE_CORE_TEST_BAD_PORT", "not-a-number");
        let err = get_env_parse::<u16>("SERVICE_CORE_TEST_BAD_PORT", None).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        std::env::remove_var("SERVICE_CORE_TEST_BAD_PORT");
    }

    #[test]
    fn parses_numeric_values() {
        let port: u16 = get_env_parse("SERVICE_CORE_TEST_UNSET_PORT", Some("8080")).unwrap();
        assert_eq!(port, 8080);
    }
}
