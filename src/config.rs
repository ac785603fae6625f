//! Client configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`):
//!
//! | Variable | Default |
//! |----------|---------|
//! | `WS_LINK_URL` | required |
//! | `WS_LINK_EVENT` | unset (raw frame mode) |
//! | `WS_LINK_RECONNECT` | `true` |
//! | `WS_LINK_RECONNECT_ATTEMPTS` | `5` |
//! | `WS_LINK_RECONNECT_INTERVAL_MS` | `1000` |
//! | `WS_LINK_LOG_FORMAT` | `text` (`json` for JSON lines) |

use std::time::Duration;

use crate::connection::ReconnectPolicy;
use crate::connection::policy::{DEFAULT_BASE_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use crate::error::ConfigError;

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket endpoint (e.g. `ws://localhost:8000/ws`).
    pub url: String,

    /// Event to subscribe to. `None` prints every raw frame instead.
    pub event: Option<String>,

    /// Reconnect behavior of the connection.
    pub policy: ReconnectPolicy,

    /// Log output format.
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file, then
    /// falls back to defaults for anything unset or unparsable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `WS_LINK_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `WS_LINK_URL` is absent or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("WS_LINK_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("WS_LINK_URL"))?;

        let event = lookup("WS_LINK_EVENT").filter(|v| !v.trim().is_empty());

        let policy = ReconnectPolicy {
            enabled: parse_bool(lookup("WS_LINK_RECONNECT"), true),
            max_attempts: parse(lookup("WS_LINK_RECONNECT_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS),
            base_interval: Duration::from_millis(parse(
                lookup("WS_LINK_RECONNECT_INTERVAL_MS"),
                u64::try_from(DEFAULT_BASE_INTERVAL.as_millis()).unwrap_or(1000),
            )),
        };

        let log_format = match lookup("WS_LINK_LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            url,
            event,
            policy,
            log_format,
        })
    }
}

/// Parses an optional value as `T`, returning `default` on missing or
/// invalid input.
fn parse<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parses an optional boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn url_is_required() {
        let Err(ConfigError::Missing(key)) = load(&[]) else {
            panic!("expected missing url");
        };
        assert_eq!(key, "WS_LINK_URL");
        assert!(load(&[("WS_LINK_URL", "  ")]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let Ok(config) = load(&[("WS_LINK_URL", "ws://localhost:8000/ws")]) else {
            panic!("config should load");
        };
        assert_eq!(config.url, "ws://localhost:8000/ws");
        assert_eq!(config.event, None);
        assert_eq!(config.policy, ReconnectPolicy::default());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn overrides_apply() {
        let Ok(config) = load(&[
            ("WS_LINK_URL", "ws://h/ws"),
            ("WS_LINK_EVENT", "task.updated"),
            ("WS_LINK_RECONNECT", "FALSE"),
            ("WS_LINK_RECONNECT_ATTEMPTS", "3"),
            ("WS_LINK_RECONNECT_INTERVAL_MS", "250"),
            ("WS_LINK_LOG_FORMAT", "json"),
        ]) else {
            panic!("config should load");
        };
        assert_eq!(config.event.as_deref(), Some("task.updated"));
        assert!(!config.policy.enabled);
        assert_eq!(config.policy.max_attempts, 3);
        assert_eq!(config.policy.base_interval, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let Ok(config) = load(&[
            ("WS_LINK_URL", "ws://h/ws"),
            ("WS_LINK_RECONNECT", "maybe"),
            ("WS_LINK_RECONNECT_ATTEMPTS", "-1"),
            ("WS_LINK_RECONNECT_INTERVAL_MS", "soon"),
        ]) else {
            panic!("config should load");
        };
        assert_eq!(config.policy, ReconnectPolicy::default());
    }
}
