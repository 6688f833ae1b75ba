//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL
//! batch that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{LedgerError, Result};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(LedgerError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Current document bytes, one row per live key.
        CREATE TABLE documents (
            key TEXT PRIMARY KEY,             -- derived key, kind-prefixed
            kind TEXT NOT NULL,               -- docType discriminator
            body TEXT NOT NULL                -- JSON document
        );

        -- Append-only version history, one row per put/delete.
        CREATE TABLE document_history (
            key TEXT NOT NULL,
            version INTEGER NOT NULL,         -- 1-indexed per key
            tx_id TEXT NOT NULL,              -- transaction that wrote it
            timestamp INTEGER NOT NULL,       -- write stamp (Unix ms)
            body TEXT,                        -- NULL for a deletion

            PRIMARY KEY (key, version)
        );

        -- Store-local counters (transaction id source).
        CREATE TABLE ledger_meta (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        INSERT INTO ledger_meta (name, value) VALUES ('tx_counter', 0);

        -- Indexes for common scans
        CREATE INDEX idx_documents_kind ON documents(kind);
        CREATE INDEX idx_history_key ON document_history(key, version);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
///
/// Migration bookkeeping only - never consulted by engine logic.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
