//! Telemetry configuration from environment variables.

use std::env;

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to startup and shutdown logs
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` string such as `era_03_peer_registry=debug,info`)
    pub log_level: String,

    /// Emit JSON lines instead of pretty output
    pub json_logs: bool,

    /// Include ANSI colour codes in pretty output
    pub ansi: bool,

    /// Status poller interval in milliseconds
    pub status_poll_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "era-node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
            status_poll_ms: 500,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `ERA_SERVICE_NAME`: service name (default: era-node)
    /// - `ERA_LOG_LEVEL`: log level (default: info)
    /// - `ERA_JSON_LOGS`: `true`/`1` for JSON output (default: false)
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(name) = env::var("ERA_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Ok(level) = env::var("ERA_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(v) = env::var("ERA_JSON_LOGS") {
            self.json_logs = parse_flag(&v);
        }
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert_eq!(config.status_poll_ms, 500);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }
}
