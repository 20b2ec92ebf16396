//! Operator added-node list: edits, persistence and `getaddednodeinfo`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    AddNodeMode, AddedNodeAddress, AddedNodeInfo, RegistryError, RegistryResult,
};
use crate::service::{PeerRegistry, RegistryEvent};

impl PeerRegistry {
    /// Apply an `addnode` command.
    ///
    /// `Add` and `Remove` edit the persisted list. `OneTry` starts a
    /// best-effort dial in the background and never fails synchronously.
    pub fn add_node(self: &Arc<Self>, node: &str, mode: AddNodeMode) -> RegistryResult<()> {
        match mode {
            AddNodeMode::Add | AddNodeMode::Remove => {
                let count = {
                    let mut state = self.state.lock();
                    if mode == AddNodeMode::Add {
                        state.added.add(node.to_string())?;
                    } else {
                        state.added.remove(node)?;
                        state.startup_added.remove(node);
                    }
                    state.added_generation += 1;
                    state.added.len()
                };
                info!(node, ?mode, count, "Added-node list updated");
                self.emit(RegistryEvent::AddedNodesChanged { count });
                self.persist_added_nodes();
                Ok(())
            }
            AddNodeMode::OneTry => {
                self.spawn_one_try(node);
                Ok(())
            }
        }
    }

    /// List `node` for this run only.
    ///
    /// An entry already present, persisted or not, is left as it is.
    pub fn add_startup_node(&self, node: &str) -> RegistryResult<()> {
        let count = {
            let mut state = self.state.lock();
            state.added.add(node.to_string())?;
            state.startup_added.insert(node.to_string());
            state.added.len()
        };
        debug!(node, count, "Startup node listed");
        self.emit(RegistryEvent::AddedNodesChanged { count });
        Ok(())
    }

    pub fn added_nodes(&self) -> Vec<String> {
        self.state.lock().added.entries().to_vec()
    }

    /// `getaddednodeinfo`.
    ///
    /// With `resolve` false only the entries are listed. Otherwise each entry
    /// is resolved outside the lock and matched against live connections;
    /// an unresolvable entry is reported unconnected with no addresses.
    pub async fn added_node_info(
        &self,
        resolve: bool,
        filter: Option<&str>,
    ) -> RegistryResult<Vec<AddedNodeInfo>> {
        let entries: Vec<String> = {
            let state = self.state.lock();
            match filter {
                Some(node) if !state.added.contains(node) => {
                    return Err(RegistryError::NotAdded(node.to_string()));
                }
                Some(node) => vec![node.to_string()],
                None => state.added.entries().to_vec(),
            }
        };

        let mut infos = Vec::with_capacity(entries.len());
        for node in entries {
            if !resolve {
                infos.push(AddedNodeInfo {
                    added_node: node,
                    connected: None,
                    addresses: None,
                });
                continue;
            }

            let resolved = match self.resolver.resolve(&node, self.default_port).await {
                Ok(addrs) => addrs,
                Err(e) => {
                    debug!(node = %node, error = %e, "Added node did not resolve");
                    Vec::new()
                }
            };

            let addresses: Vec<AddedNodeAddress> = resolved
                .into_iter()
                .map(|addr| AddedNodeAddress::new(addr.to_string(), self.direction_of(&addr)))
                .collect();
            let connected = addresses.iter().any(|a| a.connected != "false");

            infos.push(AddedNodeInfo {
                added_node: node,
                connected: Some(connected),
                addresses: Some(addresses),
            });
        }
        Ok(infos)
    }

    fn spawn_one_try(self: &Arc<Self>, node: &str) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(node, "No async runtime; onetry dial skipped");
                return;
            }
        };
        let registry = Arc::clone(self);
        let node = node.to_string();
        handle.spawn(async move {
            match registry.dial_host(&node).await {
                Ok(id) => debug!(peer_id = %id, node = %node, "onetry dial connected"),
                Err(e) => debug!(node = %node, error = %e, "onetry dial failed"),
            }
        });
    }

    /// Write the current list if it is newer than what was last saved.
    ///
    /// Runs outside the registry lock. A failed write is logged and the
    /// in-memory list stays authoritative.
    pub(crate) fn persist_added_nodes(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let mut persisted = self.persisted_generation.lock();
        let (generation, nodes) = {
            let state = self.state.lock();
            let nodes = state
                .added
                .entries()
                .iter()
                .filter(|node| !state.startup_added.contains(*node))
                .cloned()
                .collect::<Vec<_>>();
            (state.added_generation, nodes)
        };
        if generation <= *persisted {
            return;
        }

        match store.save(&nodes) {
            Ok(()) => *persisted = generation,
            Err(e) => warn!(error = %e, "Failed to persist added nodes"),
        }
    }
}
