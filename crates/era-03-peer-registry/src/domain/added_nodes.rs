//! # Added Nodes
//!
//! Operator-specified peers kept outside normal discovery. Entries are
//! address strings (`host`, `host:port`, `ip:port`), deduplicated by exact
//! string equality and kept in insertion order.

use std::str::FromStr;

use serde::Serialize;

use super::errors::RegistryError;
use super::peer::ConnectionDirection;

/// `addnode` sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddNodeMode {
    /// Persist the address.
    Add,
    /// Drop the address from the persisted list.
    Remove,
    /// Dial once, without persisting.
    OneTry,
}

impl FromStr for AddNodeMode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(AddNodeMode::Add),
            "remove" => Ok(AddNodeMode::Remove),
            "onetry" => Ok(AddNodeMode::OneTry),
            other => Err(RegistryError::InvalidMode(other.to_string())),
        }
    }
}

/// Ordered, exact-string-deduplicated address list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddedNodeList {
    nodes: Vec<String>,
}

impl AddedNodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted entries, dropping later duplicates.
    pub fn from_entries(entries: impl IntoIterator<Item = String>) -> Self {
        let mut list = Self::new();
        for entry in entries {
            let _ = list.add(entry);
        }
        list
    }

    pub fn add(&mut self, node: String) -> Result<(), RegistryError> {
        if self.contains(&node) {
            return Err(RegistryError::AlreadyAdded(node));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn remove(&mut self, node: &str) -> Result<(), RegistryError> {
        match self.nodes.iter().position(|n| n == node) {
            Some(i) => {
                self.nodes.remove(i);
                Ok(())
            }
            None => Err(RegistryError::NotAdded(node.to_string())),
        }
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    pub fn entries(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One resolved address of an added node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedNodeAddress {
    pub address: String,
    /// `"inbound"`, `"outbound"` or `"false"` when not connected.
    pub connected: String,
}

impl AddedNodeAddress {
    pub fn new(address: String, direction: Option<ConnectionDirection>) -> Self {
        let connected = match direction {
            Some(ConnectionDirection::Inbound) => "inbound",
            Some(ConnectionDirection::Outbound) => "outbound",
            None => "false",
        };
        Self {
            address,
            connected: connected.to_string(),
        }
    }
}

/// `getaddednodeinfo` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedNodeInfo {
    #[serde(rename = "addednode")]
    pub added_node: String,
    /// Present only when resolution was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddedNodeAddress>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_duplicate_rejected() {
        let mut list = AddedNodeList::new();
        list.add("x".into()).unwrap();
        assert_eq!(list.add("x".into()), Err(RegistryError::AlreadyAdded("x".into())));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove_absent_rejected() {
        let mut list = AddedNodeList::new();
        assert_eq!(list.remove("y"), Err(RegistryError::NotAdded("y".into())));
    }

    #[test]
    fn test_dedup_is_exact_string() {
        let mut list = AddedNodeList::new();
        list.add("10.0.0.1".into()).unwrap();
        list.add("10.0.0.1:13546".into()).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_order_preserved() {
        let list = AddedNodeList::from_entries(["b", "a", "b", "c"].map(String::from));
        assert_eq!(list.entries(), &["b", "a", "c"]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("add".parse::<AddNodeMode>().unwrap(), AddNodeMode::Add);
        assert_eq!("onetry".parse::<AddNodeMode>().unwrap(), AddNodeMode::OneTry);
        assert!(matches!("Add".parse::<AddNodeMode>(), Err(RegistryError::InvalidMode(_))));
    }
}
