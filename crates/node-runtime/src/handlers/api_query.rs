//! # API Query Handler
//!
//! RPC-shaped queries over the peer registry and checkpoint authority.
//! Method names, parameter order, result shapes and error codes follow the
//! node's JSON-RPC surface; the transport is out of scope here, so callers
//! hand in a method name and positional parameters and get a JSON value
//! or an `ApiQueryError` back.

use std::sync::Arc;

use era_01_network_profile::NetworkProfile;
use era_02_checkpoint_authority::{CheckpointAuthority, InMemoryBlockIndex};
use era_03_peer_registry::{AddNodeMode, ConnectionFilter, PeerRegistry, RegistryError};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::container::NodeContainer;
use crate::wire::{PROTOCOL_VERSION, USER_AGENT};

/// Node already added.
pub const RPC_CLIENT_NODE_ALREADY_ADDED: i32 = -23;
/// Node has not been added.
pub const RPC_CLIENT_NODE_NOT_ADDED: i32 = -24;
pub const RPC_INTERNAL_ERROR: i32 = -32603;
pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
pub const RPC_INVALID_PARAMS: i32 = -32602;

/// JSON-RPC style error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message} ({code})")]
pub struct ApiQueryError {
    pub code: i32,
    pub message: String,
}

impl ApiQueryError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RPC_INVALID_PARAMS, message)
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self::new(RPC_INTERNAL_ERROR, error.to_string())
    }
}

impl From<RegistryError> for ApiQueryError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::AlreadyAdded(_) => {
                Self::new(RPC_CLIENT_NODE_ALREADY_ADDED, "Error: Node already added")
            }
            RegistryError::NotAdded(_) => {
                Self::new(RPC_CLIENT_NODE_NOT_ADDED, "Error: Node has not been added.")
            }
            RegistryError::InvalidMode(mode) => {
                Self::invalid_params(format!("mode must be add, remove or onetry, got '{mode}'"))
            }
            other => Self::internal(other),
        }
    }
}

/// Answers queries against live node state.
#[derive(Clone)]
pub struct ApiQueryHandler {
    profile: Arc<NetworkProfile>,
    registry: Arc<PeerRegistry>,
    authority: Arc<CheckpointAuthority>,
    block_index: Arc<InMemoryBlockIndex>,
}

impl ApiQueryHandler {
    pub fn new(container: &NodeContainer) -> Self {
        Self {
            profile: Arc::clone(&container.profile),
            registry: Arc::clone(&container.registry),
            authority: Arc::clone(&container.authority),
            block_index: Arc::clone(&container.block_index),
        }
    }

    /// Run `method` with positional `params`.
    pub async fn dispatch(&self, method: &str, params: &[Value]) -> Result<Value, ApiQueryError> {
        debug!(method, params = params.len(), "API query");
        match method {
            "getconnectioncount" => Ok(json!(self.registry.connection_count(ConnectionFilter::All))),
            "getpeerinfo" => to_value(self.registry.snapshot()),
            "addnode" => self.add_node(params),
            "getaddednodeinfo" => self.added_node_info(params).await,
            "getnettotals" => to_value(self.registry.net_totals()),
            "ping" => {
                self.registry.queue_ping_all();
                Ok(Value::Null)
            }
            "getcheckpoint" => Ok(self.checkpoint()),
            "getnetworkinfo" => Ok(self.network_info()),
            _ => Err(ApiQueryError::new(
                RPC_METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            )),
        }
    }

    /// `addnode <node> <add|remove|onetry>`
    fn add_node(&self, params: &[Value]) -> Result<Value, ApiQueryError> {
        let node = string_param(params, 0, "node")?;
        let mode: AddNodeMode = string_param(params, 1, "mode")?.parse()?;
        self.registry.add_node(node, mode)?;
        Ok(Value::Null)
    }

    /// `getaddednodeinfo <dns> [node]`
    async fn added_node_info(&self, params: &[Value]) -> Result<Value, ApiQueryError> {
        let resolve = bool_param(params, 0, "dns")?;
        let filter = match params.get(1) {
            None | Some(Value::Null) => None,
            Some(_) => Some(string_param(params, 1, "node")?),
        };
        let infos = self.registry.added_node_info(resolve, filter).await?;
        to_value(infos)
    }

    fn checkpoint(&self) -> Value {
        let sync = self.authority.current_sync_checkpoint();
        let hardened = self.authority.last_checkpoint(self.block_index.as_ref());
        json!({
            "synccheckpoint": sync.hash.to_hex(),
            "height": sync.height,
            "lastcheckpoint": hardened.map(|cp| cp.height),
            "totalblocksestimate": self.authority.total_blocks_estimate(),
        })
    }

    fn network_info(&self) -> Value {
        json!({
            "network": self.profile.network.to_string(),
            "magic": hex::encode(self.profile.magic),
            "port": self.profile.default_port,
            "rpcport": self.profile.rpc_port,
            "protocolversion": PROTOCOL_VERSION,
            "subversion": USER_AGENT,
            "connections": self.registry.connection_count(ConnectionFilter::All),
            "inbound": self.registry.connection_count(ConnectionFilter::InboundOnly),
            "outbound": self.registry.connection_count(ConnectionFilter::OutboundOnly),
            "banned": self.registry.banned_count(),
        })
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ApiQueryError> {
    serde_json::to_value(value).map_err(ApiQueryError::internal)
}

fn string_param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a str, ApiQueryError> {
    match params.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ApiQueryError::invalid_params(format!("{name} must be a string"))),
        None => Err(ApiQueryError::invalid_params(format!("missing parameter: {name}"))),
    }
}

/// Accepts JSON booleans and the `true`/`false` strings a command line sends.
fn bool_param(params: &[Value], index: usize, name: &str) -> Result<bool, ApiQueryError> {
    match params.get(index) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s == "true" => Ok(true),
        Some(Value::String(s)) if s == "false" => Ok(false),
        Some(_) => Err(ApiQueryError::invalid_params(format!("{name} must be a boolean"))),
        None => Err(ApiQueryError::invalid_params(format!("missing parameter: {name}"))),
    }
}
