//! Adapters Layer - concrete block index implementations

pub mod memory;

pub use memory::InMemoryBlockIndex;
