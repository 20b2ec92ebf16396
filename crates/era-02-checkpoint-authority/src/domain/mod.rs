//! Domain Layer - checkpoint table and block references

pub mod checkpoints;
pub mod errors;

pub use checkpoints::*;
pub use errors::*;
