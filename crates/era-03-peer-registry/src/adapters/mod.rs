//! Adapters: file-backed added-node store and resolvers.

pub mod dns;
pub mod json_store;

pub use dns::{DnsResolver, StaticResolver};
pub use json_store::{JsonFileStore, MemoryStore};
