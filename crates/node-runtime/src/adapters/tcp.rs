//! TCP transport: the registry's `Connector` and the inbound accept path.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use era_03_peer_registry::{
    ConnectionDirection, ConnectionFilter, Connector, DialError, PeerId, PeerRegistry, RegistryError,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::session::{spawn_session, SessionContext};

/// Opens outbound TCP connections and hands each socket to a session task.
#[derive(Debug)]
pub struct TcpConnector {
    ctx: Arc<SessionContext>,
}

impl TcpConnector {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        registry: Arc<PeerRegistry>,
        peer: PeerId,
        target: SocketAddr,
    ) -> Result<(), DialError> {
        let stream = TcpStream::connect(target).await.map_err(|e| match e.kind() {
            ErrorKind::ConnectionRefused => DialError::Refused(target),
            _ => DialError::Io(e.to_string()),
        })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer_id = %peer, error = %e, "TCP_NODELAY not set");
        }

        spawn_session(
            Arc::clone(&self.ctx),
            registry,
            peer,
            ConnectionDirection::Outbound,
            stream,
        );
        Ok(())
    }
}

/// Accept inbound connections until the registry shuts down.
///
/// Banned addresses are dropped at accept; so is anything beyond
/// `max_inbound` live inbound peers.
pub async fn accept_loop(
    listener: TcpListener,
    registry: Arc<PeerRegistry>,
    ctx: Arc<SessionContext>,
    max_inbound: usize,
) {
    let mut shutdown = registry.shutdown_signal();
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening for peers");
    }

    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            },
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
        };

        if registry.connection_count(ConnectionFilter::InboundOnly) >= max_inbound {
            debug!(%addr, max_inbound, "Inbound slots full, dropping connection");
            continue;
        }

        match registry.register_connection(addr, ConnectionDirection::Inbound) {
            Ok(peer) => {
                spawn_session(
                    Arc::clone(&ctx),
                    Arc::clone(&registry),
                    peer,
                    ConnectionDirection::Inbound,
                    stream,
                );
            }
            Err(RegistryError::Banned(ip)) => debug!(%ip, "Refused banned address"),
            Err(RegistryError::ShuttingDown) => break,
            Err(e) => warn!(%addr, error = %e, "Inbound registration failed"),
        }
    }
    debug!("Accept loop stopped");
}
