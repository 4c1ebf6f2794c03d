//! Start-up configuration read from the environment

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which persistence backend to start with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Couchbase,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    /// Rule generation endpoint; generation is disabled when unset
    pub rulegen_url: Option<String>,
    pub rulegen_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            storage: StorageKind::Memory,
            rulegen_url: None,
            rulegen_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(host) = get("HOST") {
            config.host = host;
        }

        if let Some(port) = get("PORT") {
            config.port = port.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: "PORT",
                value: port.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(kind) = get("STORAGE_TYPE") {
            config.storage = match kind.to_ascii_lowercase().as_str() {
                "memory" => StorageKind::Memory,
                "couchbase" => StorageKind::Couchbase,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STORAGE_TYPE",
                        value: kind,
                        reason: "expected 'memory' or 'couchbase'".to_string(),
                    })
                }
            };
        }

        config.rulegen_url = get("RULEGEN_URL");

        if let Some(secs) = get("RULEGEN_TIMEOUT_SECS") {
            let parsed: u64 =
                secs.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                    key: "RULEGEN_TIMEOUT_SECS",
                    value: secs.clone(),
                    reason: e.to_string(),
                })?;
            if parsed == 0 {
                return Err(ConfigError::Invalid {
                    key: "RULEGEN_TIMEOUT_SECS",
                    value: secs,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.rulegen_timeout = Duration::from_secs(parsed);
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
