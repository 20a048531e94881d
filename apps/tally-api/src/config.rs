//! Tally API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                   | Default                         |
//! |----------------------------|---------------------------------|
//! | `TALLY_BIND_ADDR`          | `0.0.0.0:8080`                  |
//! | `TALLY_DB_PATH`            | `tally.db`                      |
//! | `TALLY_DB_MAX_CONNECTIONS` | `5`                             |
//! | `REDIS_URL`                | unset: in-process cache         |
//! | `TALLY_CACHE_TTL_SECS`     | `60` (`0` disables caching)     |
//! | `JWT_SECRET`               | development secret              |
//! | `JWT_ACCESS_LIFETIME_SECS` | `3600`                          |

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DEV_JWT_SECRET: &str = "tally-dev-secret-change-in-production";

/// Tally API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub db_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Redis connection string (optional)
    pub redis_url: Option<String>,

    /// Lifetime of cached list responses, in seconds
    pub cache_ttl_secs: u64,

    /// JWT secret key for verifying (and, in tests, signing) tokens
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = AppConfig {
            bind_addr: parse_or(&lookup, "TALLY_BIND_ADDR", "0.0.0.0:8080")?,

            db_path: lookup("TALLY_DB_PATH").unwrap_or_else(|| "tally.db".to_string()),

            db_max_connections: parse_or(&lookup, "TALLY_DB_MAX_CONNECTIONS", "5")?,

            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),

            cache_ttl_secs: parse_or(&lookup, "TALLY_CACHE_TTL_SECS", "60")?,

            // In production, this MUST be set via environment variable
            jwt_secret: lookup("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),

            jwt_access_lifetime_secs: parse_or(&lookup, "JWT_ACCESS_LIFETIME_SECS", "3600")?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("TALLY_DB_MAX_CONNECTIONS".to_string()));
        }

        if config.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }

        if config.jwt_access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_ACCESS_LIFETIME_SECS".to_string()));
        }

        Ok(config)
    }

    /// Whether the development JWT secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.db_path, "tally.db");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.cache_ttl_secs, 60);
        assert!(config.redis_url.is_none());
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TALLY_BIND_ADDR", "127.0.0.1:9000"),
            ("TALLY_CACHE_TTL_SECS", "0"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.cache_ttl_secs, 0);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[("TALLY_CACHE_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key) if key == "TALLY_CACHE_TTL_SECS"));

        assert!(AppConfig::from_lookup(lookup(&[("TALLY_DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("JWT_SECRET", "")])).is_err());
    }
}
