//! Sync configuration.
//!
//! `SyncSettings` is built once and handed to the sync engine and the HTTP
//! remote at construction time. Nothing in the crate reads the environment
//! behind the caller's back.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_RETRY_CEILING: u32 = 5;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LEASE_TTL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for one client's sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Base URL of the remote authority (no trailing slash)
    pub api_base_url: String,
    /// Maximum queue items per remote exchange
    pub batch_size: usize,
    /// Transport failures allowed before an item is treated as permanently failed
    pub retry_ceiling: u32,
    /// Deadline for the reachability probe
    pub probe_timeout: Duration,
    /// Deadline for one batch exchange
    pub request_timeout: Duration,
    /// How long a persisted sync lease stays valid without being released
    pub lease_ttl: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            lease_ttl: Duration::from_secs(DEFAULT_LEASE_TTL_SECS),
        }
    }
}

impl SyncSettings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Read settings through an arbitrary lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = normalize_text_option(lookup("API_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = normalize_base_url(&api_base_url)?;

        let batch_size = parse_in_range(&lookup, "SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE, 1, 500)?;
        let retry_ceiling =
            parse_in_range(&lookup, "SYNC_RETRY_CEILING", DEFAULT_RETRY_CEILING, 1, 100)?;
        let probe_timeout_secs = parse_in_range(
            &lookup,
            "SYNC_PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT_SECS,
            1,
            60,
        )?;
        let request_timeout_secs = parse_in_range(
            &lookup,
            "SYNC_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1,
            600,
        )?;
        let lease_ttl_secs = parse_in_range(
            &lookup,
            "SYNC_LEASE_TTL_SECS",
            DEFAULT_LEASE_TTL_SECS,
            10,
            86_400,
        )?;

        Ok(Self {
            api_base_url,
            batch_size,
            retry_ceiling,
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            lease_ttl: Duration::from_secs(lease_ttl_secs),
        })
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_retry_ceiling(mut self, retry_ceiling: u32) -> Self {
        self.retry_ceiling = retry_ceiling;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch size must be at least 1".into()));
        }
        if self.retry_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "retry ceiling must be at least 1".into(),
            ));
        }
        if self.lease_ttl.is_zero() {
            return Err(ConfigError::Invalid("lease TTL must be positive".into()));
        }
        normalize_base_url(&self.api_base_url).map(|_| ())
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim();
    if !is_http_url(url) {
        return Err(ConfigError::Invalid(
            "API_BASE_URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_in_range<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(default);
    };
    let value = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
    })?;
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}
