//! Lookup configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied to every lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Largest identifier list accepted in one lookup.
    /// Larger requests are rejected, never split.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// In-flight calls for per-item services.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for each remote call (login, batch call, or each per-item call).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_batch_size() -> usize {
    250
}

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LookupConfig::default();
        assert_eq!(config.max_batch_size, 250);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            max_concurrency = 16
        "#;
        let config: LookupConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.max_batch_size, 250);
        assert_eq!(config.timeout_secs, 30);
    }
}
