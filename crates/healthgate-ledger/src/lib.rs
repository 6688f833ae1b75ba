//! # Healthgate Ledger
//!
//! Storage abstraction for the Healthgate consent engine. Provides a
//! trait-based interface over the external key-addressed ledger with SQLite
//! and in-memory implementations.
//!
//! ## Overview
//!
//! The engine consumes a narrow slice of ledger capability: point
//! get/put/delete by key, predicate queries over stored JSON documents,
//! key-range scans, per-key version history, and a deterministic
//! transaction identifier. Consensus, commit ordering, and optimistic
//! conflict invalidation live outside this boundary.
//!
//! ## Key Types
//!
//! - [`LedgerStore`] - The async trait for all ledger operations
//! - [`SqliteLedger`] - SQLite-backed durable storage
//! - [`MemoryLedger`] - In-memory storage for tests
//! - [`Query`] / [`QueryPage`] - The predicate-query model
//! - [`VersionEntry`] - One version of a key in its history
//!
//! ## Design Notes
//!
//! - **Query as index**: secondary lookups re-run a predicate scan; the
//!   store enforces no uniqueness constraints of its own
//! - **Deterministic stamps**: writes carry the invocation's transaction id
//!   and timestamp, so recorded history never depends on a local clock

pub mod error;
pub mod memory;
pub mod migration;
pub mod query;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, Result};
pub use memory::MemoryLedger;
pub use query::{Condition, Page, Query, QueryEntry, QueryPage, Sort};
pub use sqlite::SqliteLedger;
pub use traits::{LedgerStore, VersionEntry, WriteStamp};
