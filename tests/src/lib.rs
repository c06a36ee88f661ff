//! # Switchboard Test Suite
//!
//! Unified test crate for cross-crate scenarios:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── e2e_chat.rs   # Chat-room end-to-end: proxy <-> publisher over the bus
//!     └── lifecycle.rs  # Timeouts, registration bookkeeping, subscription edges
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p switchboard-tests
//! ```
//!
//! In-crate unit tests live next to the code they cover; this crate holds
//! the scenarios that need a live bus, two connections, and both dispatch
//! loops running.

pub mod integration;
