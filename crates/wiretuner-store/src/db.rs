//! Database connection management
//!
//! Provides utilities for opening, configuring and checking SQLite
//! connections to a document file.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use wiretuner_core::errors::{ExError, ExErrorKind};

/// Open a SQLite database at the given path, creating it if needed
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an existing database without write access
///
/// Used to inspect a document before anything is allowed to touch it.
pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Configure a writable connection for crash-safe document storage
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = FULL;")
        .map_err(from_rusqlite)?;

    // journal_mode reports the resulting mode as a row
    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(from_rusqlite)?;
    tracing::debug!(journal_mode = %mode, "Configured document connection");

    // Contention is handled by our own bounded backoff
    conn.busy_timeout(std::time::Duration::ZERO)
        .map_err(from_rusqlite)?;

    Ok(())
}

/// Configure a read-side connection
pub fn configure_reader(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(from_rusqlite)?;
    conn.busy_timeout(std::time::Duration::from_millis(250))
        .map_err(from_rusqlite)?;
    Ok(())
}

/// Run SQLite's structural check
///
/// # Errors
///
/// Returns `IntegrityCheckFailed` listing the first problems reported.
pub fn quick_check(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA quick_check").map_err(from_rusqlite)?;
    let findings: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    if findings.len() == 1 && findings[0] == "ok" {
        return Ok(());
    }

    Err(ExError::new(ExErrorKind::IntegrityCheckFailed)
        .with_op("quick_check")
        .with_message(findings.into_iter().take(5).collect::<Vec<_>>().join("; "))
        .with_remediation("The document file is damaged; restore it from a backup."))
}

/// Whether a table exists in the main schema
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
    .map_err(from_rusqlite)
}
