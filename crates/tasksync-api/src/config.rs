use std::collections::HashMap;
use std::env;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Larger batches are refused with 413 before any item is applied
    pub max_batch_items: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TASKSYNC_API_BIND_ADDR", DEFAULT_BIND_ADDR);
        if !bind_addr.contains(':') {
            return Err(ConfigError::Invalid(
                "TASKSYNC_API_BIND_ADDR must be host:port".to_string(),
            ));
        }

        let max_batch_items = value_or_default(
            &lookup,
            "TASKSYNC_API_MAX_BATCH_ITEMS",
            &DEFAULT_MAX_BATCH_ITEMS.to_string(),
        )
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::Invalid(
                "TASKSYNC_API_MAX_BATCH_ITEMS must be an integer in [1, 10000]".to_string(),
            )
        })?;
        if !(1..=10_000).contains(&max_batch_items) {
            return Err(ConfigError::Invalid(
                "TASKSYNC_API_MAX_BATCH_ITEMS must be in [1, 10000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            max_batch_items,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults_without_environment() {
        assert_eq!(config_from(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn config_reads_trimmed_overrides() {
        let config = config_from(&[
            ("TASKSYNC_API_BIND_ADDR", "  0.0.0.0:8081 "),
            ("TASKSYNC_API_MAX_BATCH_ITEMS", "20"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8081");
        assert_eq!(config.max_batch_items, 20);
    }

    #[test]
    fn config_rejects_out_of_range_batch_limit() {
        let err = config_from(&[("TASKSYNC_API_MAX_BATCH_ITEMS", "0")]).unwrap_err();
        assert!(err.to_string().contains("TASKSYNC_API_MAX_BATCH_ITEMS"));

        let err = config_from(&[("TASKSYNC_API_MAX_BATCH_ITEMS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn config_rejects_bind_addr_without_port() {
        let err = config_from(&[("TASKSYNC_API_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("host:port"));
    }
}
