//! SQLite implementation of the LedgerStore trait.
//!
//! This is the durable backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Predicate queries compile to
//! `json_extract` expressions over the stored JSON bodies, which keeps the
//! query-as-index semantics identical to the in-memory backend.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use healthgate_core::{DocumentId, TransactionId};

use crate::error::{LedgerError, Result};
use crate::migration;
use crate::query::{Condition, Query, QueryEntry, QueryPage};
use crate::traits::{LedgerStore, VersionEntry, WriteStamp};

/// SQLite-based ledger implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking to
/// avoid blocking the async runtime.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        debug!(path = %path.display(), "sqlite ledger opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(MutexGuard<'_, Connection>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| LedgerError::InvalidData("connection mutex poisoned".to_string()))?;
            f(guard)
        })
        .await
        .map_err(|e| LedgerError::InvalidData(format!("blocking task failed: {e}")))?
    }
}

/// Convert a JSON condition value into a SQLite parameter, matching how
/// `json_extract` surfaces JSON scalars (booleans as 0/1).
fn sql_param(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}

/// Compile a [`Query`] into SQL plus its bound parameters.
///
/// Fetches one row beyond the page limit so the caller can tell whether a
/// resumption bookmark is needed without a separate COUNT.
fn compile_query(query: &Query) -> Result<(String, Vec<SqlValue>, usize, Option<usize>)> {
    let mut sql = String::from("SELECT key, body FROM documents WHERE kind = ?");
    let mut params: Vec<SqlValue> = vec![SqlValue::Text(query.kind.tag().to_string())];

    for condition in &query.conditions {
        match condition {
            Condition::Eq { field, value } => {
                sql.push_str(" AND json_extract(body, ?) = ?");
                params.push(SqlValue::Text(json_path(field)));
                params.push(sql_param(value));
            }
            Condition::Gte { field, bound } => {
                sql.push_str(" AND json_extract(body, ?) >= ?");
                params.push(SqlValue::Text(json_path(field)));
                params.push(SqlValue::Integer(*bound));
            }
            Condition::Lte { field, bound } => {
                sql.push_str(" AND json_extract(body, ?) <= ?");
                params.push(SqlValue::Text(json_path(field)));
                params.push(SqlValue::Integer(*bound));
            }
        }
    }

    match &query.sort {
        Some(sort) => {
            sql.push_str(" ORDER BY json_extract(body, ?) ");
            sql.push_str(if sort.descending { "DESC" } else { "ASC" });
            sql.push_str(", key ASC");
            params.push(SqlValue::Text(json_path(&sort.field)));
        }
        None => sql.push_str(" ORDER BY key ASC"),
    }

    let (offset, limit) = match &query.page {
        Some(page) => {
            let offset = match &page.bookmark {
                Some(b) => b
                    .parse::<usize>()
                    .map_err(|_| LedgerError::InvalidBookmark(b.clone()))?,
                None => 0,
            };
            sql.push_str(" LIMIT ? OFFSET ?");
            // One extra row tells us whether more pages remain.
            params.push(SqlValue::Integer(page.limit as i64 + 1));
            params.push(SqlValue::Integer(offset as i64));
            (offset, Some(page.limit))
        }
        None => (0, None),
    };

    Ok((sql, params, offset, limit))
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn begin_transaction(&self) -> Result<TransactionId> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE ledger_meta SET value = value + 1 WHERE name = 'tx_counter'",
                [],
            )?;
            let counter: i64 = conn.query_row(
                "SELECT value FROM ledger_meta WHERE name = 'tx_counter'",
                [],
                |row| row.get(0),
            )?;
            Ok(TransactionId::new(format!("{:016x}", counter)))
        })
        .await
    }

    async fn get(&self, key: &DocumentId) -> Result<Option<Bytes>> {
        let key = key.as_str().to_string();
        self.with_conn(move |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(body.map(Bytes::from))
        })
        .await
    }

    async fn put(&self, key: &DocumentId, value: Bytes, stamp: &WriteStamp) -> Result<()> {
        let key = key.as_str().to_string();
        let kind = key.split_once(':').map(|(k, _)| k.to_string()).unwrap_or_default();
        let body = String::from_utf8(value.to_vec())
            .map_err(|_| LedgerError::InvalidData("document body is not UTF-8 JSON".to_string()))?;
        let tx_id = stamp.tx_id.as_str().to_string();
        let timestamp = stamp.timestamp;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (key, kind, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body",
                params![key, kind, body],
            )?;
            conn.execute(
                "INSERT INTO document_history (key, version, tx_id, timestamp, body)
                 VALUES (?1,
                         (SELECT COALESCE(MAX(version), 0) + 1 FROM document_history WHERE key = ?1),
                         ?2, ?3, ?4)",
                params![key, tx_id, timestamp, body],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &DocumentId, stamp: &WriteStamp) -> Result<()> {
        let key = key.as_str().to_string();
        let tx_id = stamp.tx_id.as_str().to_string();
        let timestamp = stamp.timestamp;

        self.with_conn(move |conn| {
            conn.execute("DELETE FROM documents WHERE key = ?1", params![key])?;
            conn.execute(
                "INSERT INTO document_history (key, version, tx_id, timestamp, body)
                 VALUES (?1,
                         (SELECT COALESCE(MAX(version), 0) + 1 FROM document_history WHERE key = ?1),
                         ?2, ?3, NULL)",
                params![key, tx_id, timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let (sql, bound, offset, limit) = compile_query(query)?;

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bound), |row| {
                let key: String = row.get(0)?;
                let body: String = row.get(1)?;
                Ok(QueryEntry {
                    key: DocumentId::new(key),
                    value: Bytes::from(body),
                })
            })?;

            let mut entries: Vec<QueryEntry> =
                rows.collect::<std::result::Result<Vec<_>, _>>()?;

            let bookmark = match limit {
                Some(limit) if entries.len() > limit => {
                    entries.truncate(limit);
                    Some((offset + limit).to_string())
                }
                _ => None,
            };

            Ok(QueryPage { entries, bookmark })
        })
        .await
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<QueryEntry>> {
        let start = start.to_string();
        let end = end.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, body FROM documents WHERE key >= ?1 AND key < ?2 ORDER BY key ASC",
            )?;
            let rows = stmt.query_map(params![start, end], |row| {
                let key: String = row.get(0)?;
                let body: String = row.get(1)?;
                Ok(QueryEntry {
                    key: DocumentId::new(key),
                    value: Bytes::from(body),
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn history(&self, key: &DocumentId) -> Result<Vec<VersionEntry>> {
        let key = key.as_str().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tx_id, timestamp, body FROM document_history
                 WHERE key = ?1 ORDER BY version ASC",
            )?;
            let rows = stmt.query_map(params![key], |row| {
                let tx_id: String = row.get(0)?;
                let timestamp: i64 = row.get(1)?;
                let body: Option<String> = row.get(2)?;
                Ok(VersionEntry {
                    tx_id: TransactionId::new(tx_id),
                    timestamp,
                    value: body.map(Bytes::from),
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthgate_core::{to_bytes, AccessRequest, DocKind, Pseudonym};

    use crate::query::Page;

    fn sample_request(n: u64, patient: &str, updated: i64) -> (DocumentId, Bytes) {
        let key = DocumentId::new(format!("ACCESS_REQUEST:{:04x}", n));
        let req = AccessRequest::new(
            key.clone(),
            Pseudonym::from(patient),
            Pseudonym::from("practitioner-1"),
            updated,
            TransactionId::new(format!("tx-{}", n)),
        );
        (key, to_bytes(&req).unwrap())
    }

    fn stamp(n: u64) -> WriteStamp {
        WriteStamp::new(TransactionId::new(format!("tx-{}", n)), n as i64)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let (key, bytes) = sample_request(1, "p-1", 100);

        ledger.put(&key, bytes.clone(), &stamp(1)).await.unwrap();
        assert_eq!(ledger.get(&key).await.unwrap(), Some(bytes));
    }

    #[tokio::test]
    async fn test_query_equality_over_json_fields() {
        let ledger = SqliteLedger::open_memory().unwrap();
        for (n, patient) in [(1, "p-1"), (2, "p-2"), (3, "p-1")] {
            let (key, bytes) = sample_request(n, patient, 100 + n as i64);
            ledger.put(&key, bytes, &stamp(n)).await.unwrap();
        }

        let page = ledger
            .query(&Query::kind(DocKind::AccessRequest).eq("patientId", "p-1"))
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_query_bool_field() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let (key, bytes) = sample_request(1, "p-1", 100);
        ledger.put(&key, bytes, &stamp(1)).await.unwrap();

        let unreviewed = ledger
            .query(&Query::kind(DocKind::AccessRequest).eq("reviewed", false))
            .await
            .unwrap();
        assert_eq!(unreviewed.entries.len(), 1);

        let reviewed = ledger
            .query(&Query::kind(DocKind::AccessRequest).eq("reviewed", true))
            .await
            .unwrap();
        assert!(reviewed.entries.is_empty());
    }

    #[tokio::test]
    async fn test_sort_and_pagination_with_extra_row_probe() {
        let ledger = SqliteLedger::open_memory().unwrap();
        for n in 1..=5u64 {
            let (key, bytes) = sample_request(n, "p-1", n as i64 * 10);
            ledger.put(&key, bytes, &stamp(n)).await.unwrap();
        }

        let query = Query::kind(DocKind::AccessRequest)
            .sort_desc("lastUpdated")
            .page(Page::with_limit(3));
        let first = ledger.query(&query).await.unwrap();
        assert_eq!(first.entries.len(), 3);
        let bookmark = first.bookmark.expect("two rows remain");

        let rest = ledger
            .query(
                &Query::kind(DocKind::AccessRequest)
                    .sort_desc("lastUpdated")
                    .page(Page::resume(3, bookmark)),
            )
            .await
            .unwrap();
        assert_eq!(rest.entries.len(), 2);
        assert!(rest.bookmark.is_none());
    }

    #[tokio::test]
    async fn test_range_scan_excludes_end_key() {
        let ledger = SqliteLedger::open_memory().unwrap();
        for n in 1..=3u64 {
            let (key, bytes) = sample_request(n, "p-1", 100);
            ledger.put(&key, bytes, &stamp(n)).await.unwrap();
        }

        let entries = ledger
            .range("ACCESS_REQUEST:0001", "ACCESS_REQUEST:0003")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_str(), "ACCESS_REQUEST:0001");
    }

    #[tokio::test]
    async fn test_history_with_delete_marker() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let (key, bytes) = sample_request(1, "p-1", 100);
        ledger.put(&key, bytes, &stamp(1)).await.unwrap();
        ledger.delete(&key, &stamp(2)).await.unwrap();

        let history = ledger.history(&key).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_delete());
        assert!(history[1].is_delete());
        assert_eq!(ledger.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            let (key, bytes) = sample_request(1, "p-1", 100);
            ledger.put(&key, bytes, &stamp(1)).await.unwrap();
        }

        // Reopen and observe the persisted document.
        let ledger = SqliteLedger::open(&path).unwrap();
        let (key, _) = sample_request(1, "p-1", 100);
        assert!(ledger.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transaction_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let first = {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.begin_transaction().await.unwrap()
        };
        let ledger = SqliteLedger::open(&path).unwrap();
        let second = ledger.begin_transaction().await.unwrap();
        assert_ne!(first, second);
    }
}
