//! SQLite persistence
//!
//! Stores the favorites envelope as a row in a key-value table, for hosts
//! that already keep their state in a database file.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use super::{backup_names, unwrap_envelope, DocumentStorage};
use crate::models::{STORAGE_KEY, STORAGE_VERSION};

/// Persistence backend writing one row of `kv_store`
pub struct SqliteStorage {
    conn: Connection,
    location: String,
    key: String,
}

impl SqliteStorage {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn, path.display().to_string())
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, location: String) -> StorageResult<Self> {
        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self {
            conn,
            location,
            key: STORAGE_KEY.to_string(),
        })
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Keys of the rows holding unreadable documents, sorted
    pub fn backup_keys(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_store WHERE key LIKE ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![format!("{}.corrupt.%", self.key)], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn read_row(&self, key: &str) -> StorageResult<Option<(i64, String)>> {
        let row = self
            .conn
            .query_row(
                "SELECT version, data FROM kv_store WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }
}

impl DocumentStorage for SqliteStorage {
    fn load(&self) -> StorageResult<Option<Value>> {
        let Some((version, data)) = self.read_row(&self.key)? else {
            return Ok(None);
        };

        let payload: Value =
            serde_json::from_str(&data).map_err(|e| StorageError::InvalidFormat {
                location: self.describe(),
                details: e.to_string(),
            })?;

        // Version lives in its own column; rebuild the envelope to share validation
        let envelope = serde_json::json!({ "version": version, "data": payload });
        unwrap_envelope(&self.describe(), envelope).map(Some)
    }

    fn save(&mut self, data: &Value) -> StorageResult<()> {
        let payload = serde_json::to_string(data)?;

        self.conn.execute(
            "INSERT INTO kv_store (key, version, data, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                version = excluded.version,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![
                self.key,
                i64::from(STORAGE_VERSION),
                payload,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}#{}", self.location, self.key)
    }

    fn quarantine(&mut self) -> StorageResult<Option<String>> {
        if self.read_row(&self.key)?.is_none() {
            return Ok(None);
        }

        let now = Utc::now().to_rfc3339();
        for backup_key in backup_names(&format!("{}.corrupt", self.key)) {
            // Existing backups are left alone; try the next name instead
            let copied = self.conn.execute(
                "INSERT OR IGNORE INTO kv_store (key, version, data, updated_at)
                 SELECT ?2, version, data, ?3 FROM kv_store WHERE key = ?1",
                params![self.key, backup_key, now],
            )?;
            if copied == 1 {
                return Ok(Some(format!("{}#{}", self.location, backup_key)));
            }
        }
        unreachable!("backup name sequence is unbounded")
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("location", &self.location)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_in_memory() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.load().unwrap().is_none());

        let data = json!({"users": {"u1": []}});
        storage.save(&data).unwrap();

        assert_eq!(storage.load().unwrap().unwrap(), data);
    }

    #[test]
    fn test_save_replaces_row() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();

        storage.save(&json!({"users": {"a": []}})).unwrap();
        storage.save(&json!({"users": {"b": []}})).unwrap();

        let count: i64 = storage
            .connection()
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert!(storage.load().unwrap().unwrap()["users"].get("b").is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("favorites.db");

        {
            let mut storage = SqliteStorage::open(&path).unwrap();
            storage.save(&json!({"users": {"u1": []}})).unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(
            storage.load().unwrap().unwrap(),
            json!({"users": {"u1": []}})
        );
    }

    #[test]
    fn test_corrupt_row_is_malformed_and_quarantined() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .connection()
            .execute(
                "INSERT INTO kv_store (key, version, data, updated_at) VALUES ('favorites', 1, 'nope', 'now')",
                [],
            )
            .unwrap();

        assert!(storage.load().unwrap_err().is_malformed());

        let backup = storage.quarantine().unwrap().unwrap();
        assert!(backup.contains("#favorites.corrupt."));

        let keys = storage.backup_keys().unwrap();
        assert_eq!(keys.len(), 1);
        let copied: String = storage
            .connection()
            .query_row(
                "SELECT data FROM kv_store WHERE key = ?1",
                params![keys[0]],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(copied, "nope");
    }

    #[test]
    fn test_repeated_quarantine_keeps_every_copy() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let corrupt = |storage: &SqliteStorage, data: &str| {
            storage
                .connection()
                .execute(
                    "INSERT OR REPLACE INTO kv_store (key, version, data, updated_at) VALUES ('favorites', 1, ?1, 'now')",
                    params![data],
                )
                .unwrap();
        };

        corrupt(&storage, "first corruption");
        storage.quarantine().unwrap().unwrap();
        storage.save(&json!({"users": {}})).unwrap();

        corrupt(&storage, "second corruption");
        storage.quarantine().unwrap().unwrap();

        let copies: Vec<String> = storage
            .backup_keys()
            .unwrap()
            .iter()
            .map(|key| {
                storage
                    .connection()
                    .query_row(
                        "SELECT data FROM kv_store WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .unwrap()
            })
            .collect();

        assert_eq!(copies.len(), 2);
        assert!(copies.contains(&"first corruption".to_string()));
        assert!(copies.contains(&"second corruption".to_string()));
    }

    #[test]
    fn test_quarantine_without_row() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.quarantine().unwrap().is_none());
        assert!(storage.backup_keys().unwrap().is_empty());
    }

    #[test]
    fn test_newer_version_rejected() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .connection()
            .execute(
                "INSERT INTO kv_store (key, version, data, updated_at) VALUES ('favorites', 9, '{}', 'now')",
                [],
            )
            .unwrap();

        assert!(matches!(
            storage.load().unwrap_err(),
            StorageError::UnsupportedVersion { found: 9, .. }
        ));
    }
}
