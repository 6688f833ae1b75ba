//! In-memory implementation of the LedgerStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite but
//! keeps everything in memory with no persistence.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use healthgate_core::{DocumentId, TransactionId};

use crate::error::{LedgerError, Result};
use crate::query::{Query, QueryEntry, QueryPage};
use crate::traits::{LedgerStore, VersionEntry, WriteStamp};

/// In-memory ledger implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
/// Transaction ids come from a monotonic counter, which keeps them
/// deterministic for a given sequence of invocations.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

struct MemoryLedgerInner {
    /// Current document bytes by key. BTreeMap keeps scans ordered.
    documents: BTreeMap<String, Bytes>,

    /// Version history per key, oldest first.
    history: HashMap<String, Vec<VersionEntry>>,

    /// Monotonic transaction counter.
    tx_counter: u64,
}

impl MemoryLedger {
    /// Create a new empty in-memory ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner {
                documents: BTreeMap::new(),
                history: HashMap::new(),
                tx_counter: 0,
            }),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned() -> LedgerError {
    LedgerError::InvalidData("ledger lock poisoned".to_string())
}

/// Order two JSON field values for sorting: numbers numerically, strings
/// lexicographically, anything else by serialized form.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => a.to_string().cmp(&b.to_string()),
            },
        },
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn parse_bookmark(bookmark: &str) -> Result<usize> {
    bookmark
        .parse::<usize>()
        .map_err(|_| LedgerError::InvalidBookmark(bookmark.to_string()))
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin_transaction(&self) -> Result<TransactionId> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.tx_counter += 1;
        Ok(TransactionId::new(format!("{:016x}", inner.tx_counter)))
    }

    async fn get(&self, key: &DocumentId) -> Result<Option<Bytes>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.documents.get(key.as_str()).cloned())
    }

    async fn put(&self, key: &DocumentId, value: Bytes, stamp: &WriteStamp) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner
            .documents
            .insert(key.as_str().to_string(), value.clone());
        inner
            .history
            .entry(key.as_str().to_string())
            .or_default()
            .push(VersionEntry {
                tx_id: stamp.tx_id.clone(),
                timestamp: stamp.timestamp,
                value: Some(value),
            });
        Ok(())
    }

    async fn delete(&self, key: &DocumentId, stamp: &WriteStamp) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.documents.remove(key.as_str());
        inner
            .history
            .entry(key.as_str().to_string())
            .or_default()
            .push(VersionEntry {
                tx_id: stamp.tx_id.clone(),
                timestamp: stamp.timestamp,
                value: None,
            });
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;

        let kind_tag = Value::String(query.kind.tag().to_string());
        let mut matches: Vec<(String, Bytes, Value)> = Vec::new();

        for (key, bytes) in &inner.documents {
            let decoded: Value = match serde_json::from_slice(bytes) {
                Ok(v) => v,
                Err(e) => return Err(LedgerError::Serialization(e.to_string())),
            };
            if decoded.get("docType") != Some(&kind_tag) {
                continue;
            }
            if query.conditions.iter().all(|c| c.matches(&decoded)) {
                matches.push((key.clone(), bytes.clone(), decoded));
            }
        }

        if let Some(sort) = &query.sort {
            matches.sort_by(|(ka, _, da), (kb, _, db)| {
                let ordering = compare_values(da.get(&sort.field), db.get(&sort.field));
                let ordering = if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                // Stable tie-break on key so pagination never reshuffles.
                ordering.then_with(|| ka.cmp(kb))
            });
        }

        let total = matches.len();
        let (offset, limit) = match &query.page {
            Some(page) => {
                let offset = match &page.bookmark {
                    Some(b) => parse_bookmark(b)?,
                    None => 0,
                };
                (offset, page.limit)
            }
            None => (0, total),
        };

        let entries: Vec<QueryEntry> = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(key, value, _)| QueryEntry {
                key: DocumentId::new(key),
                value,
            })
            .collect();

        let consumed = offset + entries.len();
        let bookmark = if query.page.is_some() && consumed < total {
            Some(consumed.to_string())
        } else {
            None
        };

        Ok(QueryPage { entries, bookmark })
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<QueryEntry>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner
            .documents
            .range(start.to_string()..end.to_string())
            .map(|(key, value)| QueryEntry {
                key: DocumentId::new(key.clone()),
                value: value.clone(),
            })
            .collect())
    }

    async fn history(&self, key: &DocumentId) -> Result<Vec<VersionEntry>> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.history.get(key.as_str()).cloned().unwrap_or_default())
    }
}
