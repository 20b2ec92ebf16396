//! # Era Node Test Suite
//!
//! Cross-crate flows that no single crate can test on its own.
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── identity.rs   # profile -> checkpoint authority -> block gate
//!     └── trust.rs      # registry bans, added-node persistence, restarts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p era-tests
//! cargo test -p era-tests integration::trust::
//! ```

pub mod integration;
