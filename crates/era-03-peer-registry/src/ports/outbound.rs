//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host must provide: a way to open outbound connections,
//! a name resolver, and storage for the added-node list.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::PeerId;
use crate::service::PeerRegistry;

/// Opens an outbound connection for a record the registry has already
/// registered in `Connecting` state.
///
/// On success the implementation owns the session for `peer` (typically a
/// spawned task driving the handshake through the registry). On error the
/// registry finalizes the record itself.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        registry: Arc<PeerRegistry>,
        peer: PeerId,
        target: SocketAddr,
    ) -> Result<(), DialError>;
}

/// Errors from outbound dials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialError {
    #[error("connection to {0} timed out")]
    Timeout(SocketAddr),
    #[error("connection to {0} refused")]
    Refused(SocketAddr),
    #[error("dial cancelled by shutdown")]
    Cancelled,
    #[error("could not resolve '{0}'")]
    Unresolvable(String),
    #[error("address {0} is banned")]
    Banned(SocketAddr),
    #[error("already connected to {0}")]
    AlreadyConnected(SocketAddr),
    #[error("i/o error: {0}")]
    Io(String),
}

/// Name resolution for added nodes and DNS seeds.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host` (`name`, `name:port`, `ip`, `ip:port`, `[v6]:port`).
    /// `default_port` applies when the string carries none.
    async fn resolve(&self, host: &str, default_port: u16) -> Result<Vec<SocketAddr>, ResolveError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no addresses found for '{0}'")]
    NotFound(String),
    #[error("lookup of '{host}' failed: {reason}")]
    Lookup { host: String, reason: String },
}

/// Persistent storage for the operator added-node list.
pub trait AddedNodeStore: Send + Sync {
    fn load(&self) -> Result<Vec<String>, StoreError>;
    fn save(&self, nodes: &[String]) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed added-node file: {0}")]
    Format(#[from] serde_json::Error),
}
