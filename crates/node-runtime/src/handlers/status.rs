//! # Status Poller
//!
//! Periodic view of node status for UIs and metrics. Each tick tries the
//! registry lock and skips the tick when it is contended, so a busy network
//! thread never stalls the poller. Block height is only reported when it
//! changes; byte totals are reported every tick.
//!
//! Connection-count changes arrive as registry events instead and are
//! forwarded by [`run_metrics_bridge`].

use std::sync::Arc;
use std::time::Duration;

use era_02_checkpoint_authority::{BlockIndex, CheckpointAuthority, InMemoryBlockIndex};
use era_03_peer_registry::{PeerRegistry, RegistryEvent};
use era_telemetry::{NET_BYTES_RECV, NET_BYTES_SENT, PEERS_BANNED, PEERS_CONNECTED, SYNC_CHECKPOINT_HEIGHT};
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

use crate::container::NodeContainer;

/// Status notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    BlocksChanged { height: u32 },
    SyncCheckpointChanged { height: u32 },
    BytesChanged { recv: u64, sent: u64 },
    ConnectionsChanged { count: usize },
}

pub struct StatusPoller {
    registry: Arc<PeerRegistry>,
    block_index: Arc<InMemoryBlockIndex>,
    authority: Arc<CheckpointAuthority>,
    interval: Duration,
    events: broadcast::Sender<StatusEvent>,
    last_height: Option<u32>,
    last_sync_height: Option<u32>,
}

impl StatusPoller {
    pub fn new(container: &NodeContainer, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            registry: Arc::clone(&container.registry),
            block_index: Arc::clone(&container.block_index),
            authority: Arc::clone(&container.authority),
            interval,
            events,
            last_height: None,
            last_sync_height: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// A sender for forwarding events from elsewhere (the metrics bridge).
    pub fn sender(&self) -> broadcast::Sender<StatusEvent> {
        self.events.clone()
    }

    /// One tick. Returns what changed; empty when the registry was busy.
    pub fn poll_once(&mut self) -> Vec<StatusEvent> {
        let Some((connections, totals)) = self.registry.try_net_status() else {
            trace!("Registry busy, status tick skipped");
            return Vec::new();
        };
        PEERS_CONNECTED.set(connections as i64);

        let mut changed = Vec::new();

        if let Some(tip) = self.block_index.best_tip() {
            if self.last_height != Some(tip.height) {
                self.last_height = Some(tip.height);
                changed.push(StatusEvent::BlocksChanged { height: tip.height });
            }
        }

        let sync = self.authority.auto_select_sync_checkpoint(self.block_index.as_ref());
        if self.last_sync_height != Some(sync.height) {
            self.last_sync_height = Some(sync.height);
            SYNC_CHECKPOINT_HEIGHT.set(i64::from(sync.height));
            changed.push(StatusEvent::SyncCheckpointChanged { height: sync.height });
        }

        NET_BYTES_RECV.set(totals.total_bytes_recv as i64);
        NET_BYTES_SENT.set(totals.total_bytes_sent as i64);
        changed.push(StatusEvent::BytesChanged {
            recv: totals.total_bytes_recv,
            sent: totals.total_bytes_sent,
        });

        for event in &changed {
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
        }
        changed
    }

    /// Poll until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once();
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Status poller stopped");
    }
}

/// Mirror registry events into metrics and status events until shutdown.
pub async fn run_metrics_bridge(
    mut registry_events: broadcast::Receiver<RegistryEvent>,
    status: broadcast::Sender<StatusEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            received = registry_events.recv() => received,
            _ = shutdown.changed() => break,
        };
        match event {
            Ok(RegistryEvent::ConnectionCountChanged { count }) => {
                PEERS_CONNECTED.set(count as i64);
                let _ = status.send(StatusEvent::ConnectionsChanged { count });
            }
            Ok(RegistryEvent::PeerBanned { .. }) => PEERS_BANNED.inc(),
            Ok(RegistryEvent::AddedNodesChanged { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "Metrics bridge lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("Metrics bridge stopped");
}
