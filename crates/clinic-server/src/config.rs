//! Server configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DB_PATH: &str = "clinic.db";
pub const DEFAULT_SIGNATURE_DIR: &str = "signatures";
pub const DEFAULT_SIGNATURE_BASE_URL: &str = "/signatures";
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Runtime settings for the REST server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub rest_addr: String,
    pub db_path: PathBuf,
    pub signature_dir: PathBuf,
    pub signature_base_url: String,
    /// API key staff must present; `None` disables authentication
    pub api_key: Option<String>,
    /// Upper bound on any single storage call made for a request
    pub io_timeout: Duration,
    /// JSON catalog loaded at startup
    pub catalog_seed: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: DEFAULT_REST_ADDR.into(),
            db_path: DEFAULT_DB_PATH.into(),
            signature_dir: DEFAULT_SIGNATURE_DIR.into(),
            signature_base_url: DEFAULT_SIGNATURE_BASE_URL.into(),
            api_key: None,
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
            catalog_seed: None,
        }
    }
}

impl ServerConfig {
    /// Build the configuration from process environment variables.
    ///
    /// # Environment Variables
    /// - `CLINIC_REST_ADDR`: listen address (default: "0.0.0.0:3000")
    /// - `CLINIC_DB_PATH`: SQLite database file (default: "clinic.db")
    /// - `CLINIC_SIGNATURE_DIR`: where signature images are written
    /// - `CLINIC_SIGNATURE_BASE_URL`: public prefix for signature URLs
    /// - `CLINIC_API_KEY`: bearer key required on every request when set
    /// - `CLINIC_IO_TIMEOUT_MS`: storage timeout in milliseconds (default: 5000)
    /// - `CLINIC_CATALOG_SEED`: JSON catalog to upsert at startup
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let rest_addr = match var("CLINIC_REST_ADDR") {
            Some(addr) if addr.is_empty() => {
                return Err(ConfigError::Invalid {
                    var: "CLINIC_REST_ADDR",
                    reason: "address is empty".into(),
                })
            }
            Some(addr) => addr,
            None => defaults.rest_addr,
        };

        let io_timeout = match var("CLINIC_IO_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "CLINIC_IO_TIMEOUT_MS",
                    reason: format!("'{}' is not a whole number of milliseconds", raw),
                })?;
                if ms == 0 {
                    return Err(ConfigError::Invalid {
                        var: "CLINIC_IO_TIMEOUT_MS",
                        reason: "timeout must be greater than zero".into(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => defaults.io_timeout,
        };

        let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());

        Ok(Self {
            rest_addr,
            db_path: non_empty("CLINIC_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            signature_dir: non_empty("CLINIC_SIGNATURE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.signature_dir),
            signature_base_url: non_empty("CLINIC_SIGNATURE_BASE_URL")
                .unwrap_or(defaults.signature_base_url),
            api_key: non_empty("CLINIC_API_KEY"),
            io_timeout,
            catalog_seed: non_empty("CLINIC_CATALOG_SEED").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.io_timeout, Duration::from_millis(5000));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CLINIC_REST_ADDR", "127.0.0.1:8080"),
            ("CLINIC_DB_PATH", "/var/lib/clinic/clinic.db"),
            ("CLINIC_API_KEY", "secret"),
            ("CLINIC_IO_TIMEOUT_MS", "250"),
            ("CLINIC_CATALOG_SEED", "catalog.json"),
        ])
        .unwrap();
        assert_eq!(config.rest_addr, "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/clinic/clinic.db"));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.io_timeout, Duration::from_millis(250));
        assert_eq!(config.catalog_seed, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn test_blank_api_key_disables_auth() {
        let config = config_from(&[("CLINIC_API_KEY", "  ")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(config_from(&[("CLINIC_IO_TIMEOUT_MS", "soon")]).is_err());
        assert!(config_from(&[("CLINIC_IO_TIMEOUT_MS", "0")]).is_err());
        assert!(matches!(
            config_from(&[("CLINIC_REST_ADDR", "")]),
            Err(ConfigError::Invalid {
                var: "CLINIC_REST_ADDR",
                ..
            })
        ));
    }
}
