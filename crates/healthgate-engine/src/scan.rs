//! Shared predicate-scan helpers.
//!
//! Every secondary lookup in this engine is a point-in-time scan with
//! optimistic-concurrency semantics, not a store-enforced constraint:
//! uniqueness is checked here, at the application layer, and a violated
//! invariant is fatal.

use serde::de::DeserializeOwned;

use healthgate_core::from_bytes;
use healthgate_ledger::{LedgerStore, Query};

use crate::error::{EngineError, Result};

/// Run a query expected to match at most one document.
///
/// Returns `None` for zero matches and `IntegrityViolation` for more than
/// one - that means a prior consistency bug, and is never resolved by
/// silently picking a winner.
pub(crate) async fn at_most_one<L, T>(ledger: &L, query: Query, context: &str) -> Result<Option<T>>
where
    L: LedgerStore,
    T: DeserializeOwned,
{
    let page = ledger.query(&query).await?;
    match page.entries.len() {
        0 => Ok(None),
        1 => Ok(Some(from_bytes(&page.entries[0].value)?)),
        matches => Err(EngineError::IntegrityViolation {
            kind: query.kind,
            matches,
            context: context.to_string(),
        }),
    }
}

/// Run a query and decode every matching document.
pub(crate) async fn collect<L, T>(ledger: &L, query: Query) -> Result<Vec<T>>
where
    L: LedgerStore,
    T: DeserializeOwned,
{
    let page = ledger.query(&query).await?;
    page.entries
        .iter()
        .map(|entry| from_bytes(&entry.value).map_err(EngineError::from))
        .collect()
}
