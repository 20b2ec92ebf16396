//! # Adapters
//!
//! The TCP transport behind the registry's `Connector` port and the per-peer
//! session that speaks the wire protocol.

pub mod session;
pub mod tcp;

pub use session::{run_session, spawn_session, CloseReason, SessionContext, MIN_PEER_PROTO_VERSION};
pub use tcp::{accept_loop, TcpConnector};
