//! Prometheus metrics for the era node.
//!
//! All metrics follow the naming convention: `era_<area>_<metric>[_unit]`
//!
//! ## Metric Types
//!
//! - **Counter**: monotonically increasing (e.g. `era_peers_banned_total`)
//! - **Gauge**: can go up or down (e.g. `era_peers_connected`)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PEER METRICS
    // =========================================================================

    /// Live connections, both directions
    pub static ref PEERS_CONNECTED: IntGauge = IntGauge::new(
        "era_peers_connected",
        "Number of live peer connections"
    ).expect("metric creation failed");

    /// Addresses banned, by score or by the operator
    pub static ref PEERS_BANNED: IntCounter = IntCounter::new(
        "era_peers_banned_total",
        "Total number of address bans"
    ).expect("metric creation failed");

    /// Cumulative bytes written to peers
    pub static ref NET_BYTES_SENT: IntGauge = IntGauge::new(
        "era_net_bytes_sent",
        "Bytes sent to peers since start"
    ).expect("metric creation failed");

    /// Cumulative bytes read from peers
    pub static ref NET_BYTES_RECV: IntGauge = IntGauge::new(
        "era_net_bytes_recv",
        "Bytes received from peers since start"
    ).expect("metric creation failed");

    // =========================================================================
    // CHECKPOINT METRICS
    // =========================================================================

    /// Height of the current synchronization checkpoint
    pub static ref SYNC_CHECKPOINT_HEIGHT: IntGauge = IntGauge::new(
        "era_sync_checkpoint_height",
        "Height of the synchronization checkpoint"
    ).expect("metric creation failed");

    /// Blocks refused by checkpoint rules
    pub static ref BLOCKS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("era_blocks_rejected_total", "Blocks rejected by checkpoint rules"),
        &["reason"]  // hardened_checkpoint, sync_checkpoint, sync_fork, ...
    ).expect("metric creation failed");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Peers
        Box::new(PEERS_CONNECTED.clone()),
        Box::new(PEERS_BANNED.clone()),
        Box::new(NET_BYTES_SENT.clone()),
        Box::new(NET_BYTES_RECV.clone()),
        // Checkpoints
        Box::new(SYNC_CHECKPOINT_HEIGHT.clone()),
        Box::new(BLOCKS_REJECTED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics in the Prometheus text format.
pub fn render_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
