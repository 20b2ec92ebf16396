//! # Era Node Runtime
//!
//! Wires the network profile, checkpoint authority and peer registry into a
//! running node.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and the component container
//! - `wire/` - frame header codec and handshake payloads
//! - `adapters/` - TCP connector, inbound accept loop, per-peer sessions
//! - `wiring/` - connection manager loops
//! - `handlers/` - RPC-shaped queries, checkpoint gate, status poller
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `ERA_*` environment, then flags)
//! 2. Initialize telemetry
//! 3. Select the network profile and build the container
//! 4. Bind the listener (unless `--no-listen`)
//! 5. Spawn seeding, added-node, housekeeping and status tasks
//! 6. Run until Ctrl-C, then shut down: cancel dials, drop sessions,
//!    finalize every peer record once

pub mod adapters;
pub mod cli;
pub mod container;
pub mod handlers;
pub mod wire;
pub mod wiring;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::accept_loop;
use crate::container::{NodeConfig, NodeContainer};
use crate::handlers::{run_metrics_bridge, ApiQueryHandler, CheckpointGate, StatusEvent, StatusPoller};
use crate::wiring::ConnectionManager;

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The running node.
pub struct NodeRuntime {
    container: Arc<NodeContainer>,
    api: ApiQueryHandler,
    gate: CheckpointGate,
    status_tx: broadcast::Sender<StatusEvent>,
    poller: Mutex<Option<StatusPoller>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig) -> Result<Self> {
        Ok(Self::with_container(NodeContainer::new(config)?))
    }

    pub fn with_container(container: NodeContainer) -> Self {
        let poll_interval = Duration::from_millis(container.config.telemetry.status_poll_ms.max(1));
        let poller = StatusPoller::new(&container, poll_interval);
        let api = ApiQueryHandler::new(&container);
        let gate = CheckpointGate::new(&container);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            container: Arc::new(container),
            api,
            gate,
            status_tx: poller.sender(),
            poller: Mutex::new(Some(poller)),
            tasks: Mutex::new(Vec::new()),
            local_addr: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind the listener and spawn every background task.
    pub async fn start(&self) -> Result<()> {
        let container = &self.container;
        let network = &container.config.network;
        info!(
            network = %container.profile.network,
            genesis = %container.profile.genesis_hash,
            "Starting era node"
        );

        let mut tasks = Vec::new();

        if network.listen {
            let bind = SocketAddr::new(network.bind, container.profile.default_port());
            let listener = TcpListener::bind(bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            *self.local_addr.lock() = listener.local_addr().ok();
            tasks.push(tokio::spawn(accept_loop(
                listener,
                Arc::clone(&container.registry),
                Arc::clone(&container.session),
                network.max_inbound,
            )));
        }

        let connman = Arc::new(ConnectionManager::new(
            Arc::clone(&container.registry),
            Arc::clone(&container.profile),
            network.clone(),
        ));
        tasks.push(tokio::spawn(Arc::clone(&connman).run_seeding(self.shutdown_rx.clone())));
        tasks.push(tokio::spawn(Arc::clone(&connman).run_added_nodes(self.shutdown_rx.clone())));
        tasks.push(tokio::spawn(connman.run_housekeeping(self.shutdown_rx.clone())));

        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            tasks.push(tokio::spawn(poller.run(self.shutdown_rx.clone())));
        }
        tasks.push(tokio::spawn(run_metrics_bridge(
            container.registry.subscribe(),
            self.status_tx.clone(),
            self.shutdown_rx.clone(),
        )));

        let spawned = tasks.len();
        self.tasks.lock().extend(tasks);
        info!(tasks = spawned, listen = ?self.local_addr(), "Node started");
        Ok(())
    }

    /// Stop every task and finalize all peer records.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);
        let finalized = self.container.registry.shutdown();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Background task did not stop in time");
            }
        }
        info!(peers = finalized, "Shutdown complete");
    }

    pub fn container(&self) -> &NodeContainer {
        &self.container
    }

    pub fn api(&self) -> &ApiQueryHandler {
        &self.api
    }

    pub fn checkpoint_gate(&self) -> &CheckpointGate {
        &self.gate
    }

    /// Listener address once `start` has bound it.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }
}
