//! LedgerStore trait: the abstract interface over the external ledger.
//!
//! This trait models exactly the store capabilities the consent engine
//! consumes: point get/put/delete by key, predicate query, key-range scan,
//! per-key version history, and a deterministic transaction identifier.
//! Consensus, commit ordering, and conflict invalidation stay on the other
//! side of this boundary: a conflicting concurrent transaction is the
//! calling client's retry problem, never surfaced through this trait.

use async_trait::async_trait;
use bytes::Bytes;

use healthgate_core::{DocumentId, TransactionId};

use crate::error::Result;
use crate::query::{Query, QueryEntry, QueryPage};

/// The transaction id and timestamp a write is stamped with.
///
/// Both values come from the invocation context, never from a clock read
/// inside the store, so the version history any replica records for a key
/// is identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStamp {
    pub tx_id: TransactionId,
    pub timestamp: i64,
}

impl WriteStamp {
    pub fn new(tx_id: TransactionId, timestamp: i64) -> Self {
        Self { tx_id, timestamp }
    }
}

/// One version of a key, as returned by [`LedgerStore::history`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    /// The transaction that wrote this version.
    pub tx_id: TransactionId,
    /// The write stamp's timestamp (Unix ms).
    pub timestamp: i64,
    /// The document bytes, `None` for a deletion.
    pub value: Option<Bytes>,
}

impl VersionEntry {
    /// Whether this version recorded a deletion.
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

/// The async interface every ledger backend implements.
///
/// # Design Notes
///
/// - **Query as index**: there are no secondary indices. Lookups by field
///   re-run a predicate scan; uniqueness is an application-layer invariant
///   checked optimistically, not a store constraint.
/// - **History**: every put/delete appends a version entry; history is
///   returned oldest first.
/// - **Transaction ids**: `begin_transaction` yields a deterministic id
///   that stays stable for the lifetime of one invocation.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start an invocation, returning its transaction identifier.
    async fn begin_transaction(&self) -> Result<TransactionId>;

    /// Point read by key.
    async fn get(&self, key: &DocumentId) -> Result<Option<Bytes>>;

    /// Write a document under a key, recording a version entry.
    async fn put(&self, key: &DocumentId, value: Bytes, stamp: &WriteStamp) -> Result<()>;

    /// Delete a key, recording a deletion version entry.
    async fn delete(&self, key: &DocumentId, stamp: &WriteStamp) -> Result<()>;

    /// Predicate query over stored documents of one kind.
    async fn query(&self, query: &Query) -> Result<QueryPage>;

    /// Scan keys in `[start, end)` lexicographic order.
    async fn range(&self, start: &str, end: &str) -> Result<Vec<QueryEntry>>;

    /// Full version history of a key, oldest first.
    async fn history(&self, key: &DocumentId) -> Result<Vec<VersionEntry>>;
}
