//! Batch endpoint configuration.
//!
//! Defaults are hardcoded; every field can be overridden from an environment
//! variable prefixed with `BATCH_`.

use std::str::FromStr;
use std::time::Duration;

use batch_core::DEFAULT_BATCH_PATH;
use thiserror::Error;

/// What to do when one sub-request faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Report the fault in that item's slot and keep going.
    #[default]
    Isolate,
    /// Fail the whole batch on the first faulting item.
    Abort,
}

impl FromStr for FaultPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolate" => Ok(FaultPolicy::Isolate),
            "abort" => Ok(FaultPolicy::Abort),
            other => Err(ConfigError::Invalid {
                key: "BATCH_FAULT_POLICY",
                message: format!("unknown policy {other:?}, expected \"isolate\" or \"abort\""),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Exact request path that is treated as a batch.
    pub path: String,
    pub max_items: usize,
    pub max_body_bytes: usize,
    /// Limit on each captured sub-response body.
    pub max_response_bytes: usize,
    pub fault_policy: FaultPolicy,
    pub strip_hop_by_hop: bool,
    /// Deadline for the whole batch.
    pub timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_BATCH_PATH.to_string(),
            max_items: 256,
            max_body_bytes: 2 * 1024 * 1024,
            max_response_bytes: 8 * 1024 * 1024,
            fault_policy: FaultPolicy::Isolate,
            strip_hop_by_hop: false,
            timeout: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl BatchConfig {
    /// Defaults overridden by `BATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `BATCH_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup("BATCH_PATH") {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    key: "BATCH_PATH",
                    message: format!("{path:?} must start with '/'"),
                });
            }
            config.path = path;
        }
        if let Some(value) = lookup("BATCH_MAX_ITEMS") {
            config.max_items = parse_number("BATCH_MAX_ITEMS", &value)?;
        }
        if let Some(value) = lookup("BATCH_MAX_BODY_BYTES") {
            config.max_body_bytes = parse_number("BATCH_MAX_BODY_BYTES", &value)?;
        }
        if let Some(value) = lookup("BATCH_MAX_RESPONSE_BYTES") {
            config.max_response_bytes = parse_number("BATCH_MAX_RESPONSE_BYTES", &value)?;
        }
        if let Some(value) = lookup("BATCH_FAULT_POLICY") {
            config.fault_policy = value.parse()?;
        }
        if let Some(value) = lookup("BATCH_STRIP_HOP_BY_HOP") {
            config.strip_hop_by_hop = parse_bool("BATCH_STRIP_HOP_BY_HOP", &value)?;
        }
        if let Some(value) = lookup("BATCH_TIMEOUT_MS") {
            let millis: u64 = parse_number("BATCH_TIMEOUT_MS", &value)?;
            config.timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        Ok(config)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("{other:?} is not a boolean"),
        }),
    }
}
