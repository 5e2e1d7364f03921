//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - In-process tables with per-row async locks for the LedgerStore port,
//!   optionally backed by a JSON snapshot file

pub mod memory;

pub use memory::{MemoryStore, MemoryTx, DEFAULT_LOCK_TIMEOUT};
