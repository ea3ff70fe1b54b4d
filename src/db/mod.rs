//! SQLite backing store for one scope: open, pragmas, schema, health check.

pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Open (or create) a scope database at the given path with schema initialized
/// and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Store(format!("failed to create directory {}: {e}", parent.display()))
        })?;
    }

    let mut conn = Connection::open(path)
        .map_err(|e| Error::Store(format!("failed to open database at {}: {e}", path.display())))?;

    // WAL for concurrent readers; single writer per scope.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    prepare(&mut conn)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with the full schema. Used by tests and
/// throwaway stores.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    prepare(&mut conn)?;
    Ok(conn)
}

fn prepare(conn: &mut Connection) -> Result<()> {
    schema::init_schema(conn)
        .map_err(|e| Error::Store(format!("failed to initialize schema: {e}")))?;
    migrations::run_migrations(conn)
        .map_err(|e| Error::Store(format!("failed to run migrations: {e}")))?;
    Ok(())
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub embedding_model: Option<String>,
    pub block_count: u64,
    pub message_count: u64,
    pub embedding_count: u64,
    pub log_count: u64,
}

/// Run `PRAGMA integrity_check` and collect row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let count = |table: &str| -> Result<u64> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        schema_version: migrations::get_schema_version(conn)?,
        embedding_model: migrations::get_embedding_model(conn)?,
        block_count: count("memory_blocks")?,
        message_count: count("messages")?,
        embedding_count: count("block_embeddings")?,
        log_count: count("memory_log")?,
        integrity_details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_is_migrated() {
        let conn = open_in_memory().unwrap();
        assert_eq!(
            migrations::get_schema_version(&conn).unwrap(),
            migrations::CURRENT_SCHEMA_VERSION
        );
    }

    #[test]
    fn health_check_passes_on_fresh_db() {
        let conn = open_in_memory().unwrap();
        let report = check_database_health(&conn).unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.block_count, 0);
        assert_eq!(report.message_count, 0);
        assert_eq!(report.embedding_count, 0);
        assert!(report.embedding_model.is_some());
    }
}
