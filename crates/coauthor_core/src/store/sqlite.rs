//! SQLite-backed storage implementation.
//!
//! Persists document records and snapshot collections to a SQLite database.
//! The change log is stored as a JSON column on the document row; snapshot
//! state is a BLOB per row.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::changes::ChangeRecord;
use crate::error::EngineError;

use super::storage::{DocumentStore, StoreResult};
use super::types::{DocumentRecord, VersionInfo, VersionSnapshot};

/// SQLite-backed document store.
///
/// # Thread Safety
///
/// The connection is wrapped in a `Mutex` for thread-safe access.
/// SQLite itself is used in serialized threading mode.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or if schema
    /// initialization fails.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database for testing.
    ///
    /// Data is lost when the store is dropped.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            -- One durable record per document
            CREATE TABLE IF NOT EXISTS documents (
                document_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                change_log TEXT NOT NULL DEFAULT '[]',
                replica_state BLOB NOT NULL
            );

            -- Bounded, immutable snapshot collection per document
            CREATE TABLE IF NOT EXISTS snapshots (
                document_id TEXT NOT NULL,
                id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                state BLOB NOT NULL,
                PRIMARY KEY (document_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_doc ON snapshots(document_id, id);
            "#,
        )?;
        Ok(())
    }
}

fn encode_change_log(records: &[ChangeRecord]) -> StoreResult<String> {
    serde_json::to_string(records)
        .map_err(|e| EngineError::Persistence(format!("Failed to encode change log: {}", e)))
}

fn decode_change_log(json: &str) -> Vec<ChangeRecord> {
    match serde_json::from_str(json) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("Dropping unreadable change log column: {}", e);
            Vec::new()
        }
    }
}

impl DocumentStore for SqliteStore {
    fn load_document(&self, document_id: &str) -> StoreResult<Option<DocumentRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT document_id, title, created_at, updated_at, deleted, change_log, replica_state
                 FROM documents WHERE document_id = ?",
                params![document_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(
            |(document_id, title, created_at, updated_at, deleted, change_log, replica_state)| {
                DocumentRecord {
                    document_id,
                    title,
                    created_at,
                    updated_at,
                    deleted: deleted != 0,
                    change_log: decode_change_log(&change_log),
                    replica_state,
                }
            },
        ))
    }

    fn save_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        let change_log = encode_change_log(&record.change_log)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO documents
             (document_id, title, created_at, updated_at, deleted, change_log, replica_state)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.document_id,
                record.title,
                record.created_at,
                record.updated_at,
                record.deleted as i64,
                change_log,
                record.replica_state,
            ],
        )?;
        Ok(())
    }

    fn mark_deleted(&self, document_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE documents SET deleted = 1 WHERE document_id = ?",
            params![document_id],
        )?;
        if updated == 0 {
            return Err(EngineError::NotFound(document_id.to_string()));
        }
        Ok(())
    }

    fn list_documents(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT document_id FROM documents ORDER BY document_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    fn append_changes(&self, document_id: &str, records: &[ChangeRecord]) -> StoreResult<()> {
        // Read-modify-write under the connection lock so concurrent appends
        // never overwrite each other.
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT change_log FROM documents WHERE document_id = ?",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(existing) = existing else {
            return Err(EngineError::NotFound(document_id.to_string()));
        };

        let mut log = decode_change_log(&existing);
        log.extend_from_slice(records);
        let encoded = encode_change_log(&log)?;

        conn.execute(
            "UPDATE documents SET change_log = ? WHERE document_id = ?",
            params![encoded, document_id],
        )?;
        Ok(())
    }

    fn insert_snapshot(&self, document_id: &str, snapshot: &VersionSnapshot) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (document_id, id, created_at, state) VALUES (?, ?, ?, ?)",
            params![document_id, snapshot.id, snapshot.created_at, snapshot.state],
        )?;
        Ok(())
    }

    fn load_snapshot(
        &self,
        document_id: &str,
        snapshot_id: i64,
    ) -> StoreResult<Option<VersionSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, created_at, state FROM snapshots WHERE document_id = ? AND id = ?",
                params![document_id, snapshot_id],
                |row| {
                    Ok(VersionSnapshot {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        state: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn list_snapshots(&self, document_id: &str) -> StoreResult<Vec<VersionInfo>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at FROM snapshots WHERE document_id = ? ORDER BY id ASC",
        )?;
        let infos = stmt
            .query_map(params![document_id], |row| {
                Ok(VersionInfo {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(infos)
    }

    fn prune_snapshots(&self, document_id: &str, keep: usize) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let pruned = conn.execute(
            "DELETE FROM snapshots WHERE document_id = ?1 AND id NOT IN (
                 SELECT id FROM snapshots WHERE document_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![document_id, keep as i64],
        )?;
        Ok(pruned)
    }
}
