//! # Era Telemetry
//!
//! Logging and metrics for the node.
//!
//! - **Logs:** `tracing` events rendered by `tracing-subscriber`, pretty for
//!   terminals or JSON for log shippers.
//! - **Metrics:** a Prometheus registry exported as text by
//!   [`render_metrics`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use era_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! tracing::info!("node starting");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ERA_LOG_LEVEL` | `info` | Filter directive, `RUST_LOG` takes precedence |
//! | `ERA_JSON_LOGS` | `false` | Emit JSON lines instead of pretty output |
//! | `ERA_SERVICE_NAME` | `era-node` | Service name attached to startup logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    register_metrics, render_metrics, BLOCKS_REJECTED, NET_BYTES_RECV, NET_BYTES_SENT,
    PEERS_BANNED, PEERS_CONNECTED, SYNC_CHECKPOINT_HEIGHT,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the log subscriber and register metrics.
///
/// Call once per process. The returned guard logs on drop so the last line
/// of a run marks a clean exit.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Keeps telemetry alive for the process.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Log a peer-related event with standard fields.
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $msg:expr, $peer_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            peer_id = %$peer_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a block-related event with standard fields.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $msg:expr, $height:expr, $hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            height = $height,
            block_hash = %$hash,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "era-node");
    }

    #[test]
    fn test_macros_expand() {
        log_peer_event!(debug, "peer event", 7u64, bytes = 10);
        log_block_event!(warn, "block event", 5u32, "00ff");
    }
}
