//! Shared handle to a document's SQLite container
//!
//! A file-backed store keeps one writer connection and one reader
//! connection. WAL mode lets the reader observe a consistent committed prefix
//! while the writer appends. An in-memory store shares a single connection.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{lock_poisoned, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

struct StorageInner {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
    path: Option<PathBuf>,
}

/// Cloneable handle; clones share the same connections
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Storage {
    /// Open (or create) a document file for reading and writing
    ///
    /// The caller is responsible for running container migrations.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let writer = db::open(path)?;
        db::configure(&writer)?;

        let reader = db::open(path)?;
        db::configure_reader(&reader)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                writer: Mutex::new(writer),
                reader: Some(Mutex::new(reader)),
                path: Some(path.to_path_buf()),
            }),
        })
    }

    /// Wrap an in-memory database (tests and scratch documents)
    pub fn in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(crate::errors::from_rusqlite)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already configured connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                writer: Mutex::new(conn),
                reader: None,
                path: None,
            }),
        }
    }

    /// Exclusive access to the writer connection
    pub fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner.writer.lock().map_err(|_| lock_poisoned("writer"))
    }

    /// Access to the read-side connection
    pub fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        match &self.inner.reader {
            Some(reader) => reader.lock().map_err(|_| lock_poisoned("reader")),
            None => self.writer(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.inner.path)
            .field("split_reader", &self.inner.reader.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_sees_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_file(dir.path().join("doc.wiretuner")).unwrap();

        storage
            .writer()
            .unwrap()
            .execute_batch("CREATE TABLE scratch (x INTEGER); INSERT INTO scratch VALUES (7);")
            .unwrap();

        let x: i64 = storage
            .reader()
            .unwrap()
            .query_row("SELECT x FROM scratch", [], |row| row.get(0))
            .unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn test_in_memory_shares_one_connection() {
        let storage = Storage::in_memory().unwrap();
        storage
            .writer()
            .unwrap()
            .execute("CREATE TABLE scratch (x INTEGER)", [])
            .unwrap();

        assert!(db::table_exists(&storage.reader().unwrap(), "scratch").unwrap());
        assert!(storage.path().is_none());
    }
}
