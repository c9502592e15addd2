//! Session tuning.
//!
//! Nothing here is persisted; values come from defaults, an embedding
//! application's own config format via serde, or environment overrides.

use crate::constants::{POLL_INTERVAL_MS, READ_TIMEOUT_MS, STATUS_DISPLAY_MS};
use crate::error::{FillerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_POLL_MS: &str = "BOTTLE_FILLER_POLL_MS";
pub const ENV_READ_TIMEOUT_MS: &str = "BOTTLE_FILLER_READ_TIMEOUT_MS";
pub const ENV_STATUS_MS: &str = "BOTTLE_FILLER_STATUS_MS";
pub const ENV_BACKGROUND_POLL: &str = "BOTTLE_FILLER_BACKGROUND_POLL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval of the background inbound poll
    pub poll_interval_ms: u64,
    /// Read timeout configured on the opened port
    pub read_timeout_ms: u64,
    /// Display time attached to received status lines
    pub status_display_ms: u64,
    /// Run the background poller; when off the caller drives `poll_once`
    pub background_poll: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_MS,
            read_timeout_ms: READ_TIMEOUT_MS,
            status_display_ms: STATUS_DISPLAY_MS,
            background_poll: true,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by any `BOTTLE_FILLER_*` variables that are set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_POLL_MS) {
            config.poll_interval_ms = parse_millis(ENV_POLL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_READ_TIMEOUT_MS) {
            config.read_timeout_ms = parse_millis(ENV_READ_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_STATUS_MS) {
            config.status_display_ms = parse_millis(ENV_STATUS_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_BACKGROUND_POLL) {
            config.background_poll = parse_flag(ENV_BACKGROUND_POLL, &v)?;
        }
        Ok(config)
    }

    /// Background poll cadence
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Port read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Display time of received status lines
    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(FillerError::Config(format!("{key} must be greater than zero"))),
        Ok(ms) => Ok(ms),
        Err(e) => Err(FillerError::Config(format!("{key}={value:?}: {e}"))),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FillerError::Config(format!("{key}={value:?} is not a boolean"))),
    }
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_poll_every_100ms() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.status_display(), Duration::from_secs(3));
        assert!(config.background_poll);
    }

    #[test]
    fn overrides_are_applied() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ENV_POLL_MS, "250"),
            (ENV_BACKGROUND_POLL, "off"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert!(!config.background_poll);
        assert_eq!(config.read_timeout_ms, READ_TIMEOUT_MS);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = SessionConfig::from_lookup(lookup(&[(ENV_POLL_MS, "fast")])).unwrap_err();
        assert!(matches!(err, FillerError::Config(_)));
        assert!(SessionConfig::from_lookup(lookup(&[(ENV_STATUS_MS, "0")])).is_err());
        let maybe = lookup(&[(ENV_BACKGROUND_POLL, "maybe")]);
        assert!(SessionConfig::from_lookup(maybe).is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"poll_interval_ms": 50}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.status_display_ms, STATUS_DISPLAY_MS);
    }
}
