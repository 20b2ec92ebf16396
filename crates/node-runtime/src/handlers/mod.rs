//! # Handlers
//!
//! Components that act on node state rather than on the wire:
//!
//! - `api_query`: RPC-shaped queries
//! - `checkpoint_gate`: checkpoint rules in front of the block index
//! - `status`: the status poller and the registry-to-metrics bridge

pub mod api_query;
pub mod checkpoint_gate;
pub mod status;

pub use api_query::{ApiQueryError, ApiQueryHandler};
pub use checkpoint_gate::CheckpointGate;
pub use status::{run_metrics_bridge, StatusEvent, StatusPoller};
