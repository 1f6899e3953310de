//! Storage layer
//!
//! Durable key-value persistence for the favorites document.
//!
//! ## Architecture
//!
//! - **JSON file**: default backend, one atomically written file
//! - **SQLite**: the same envelope stored as a row in a key-value table
//! - **Memory**: shared in-process backend for tests and embedding
//!
//! Every backend stores the document inside a versioned envelope:
//!
//! ```text
//! {"version": 1, "key": "favorites", "data": { "users": { ... } }}
//! ```
//!
//! Backends only move envelopes around. Interpreting the `data` payload
//! (including legacy migration) is the store's job.

pub mod error;
pub mod memory;
pub mod persistence;
pub mod schema;
pub mod sqlite;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::{Backend, Config};
use crate::models::{STORAGE_KEY, STORAGE_VERSION};

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use persistence::JsonFileStorage;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;

/// Versioned load/save of a single JSON document
pub trait DocumentStorage: Send {
    /// Load the stored payload, or `None` if nothing has been saved yet
    fn load(&self) -> StorageResult<Option<Value>>;

    /// Replace the stored payload
    fn save(&mut self, data: &Value) -> StorageResult<()>;

    /// Human-readable location, used in logs and status output
    fn describe(&self) -> String;

    /// Keep a copy of an unreadable document before it gets overwritten
    ///
    /// Every call makes a new copy; earlier copies are never replaced.
    /// Returns where the copy was put, if anywhere.
    fn quarantine(&mut self) -> StorageResult<Option<String>> {
        Ok(None)
    }
}

/// Open the backend selected in the configuration
pub fn open_storage(config: &Config) -> Result<Box<dyn DocumentStorage>> {
    let storage: Box<dyn DocumentStorage> = match config.backend {
        Backend::Json => Box::new(JsonFileStorage::new(config.document_path())),
        Backend::Sqlite => Box::new(
            SqliteStorage::open(&config.sqlite_path())
                .context("Failed to open SQLite database")?,
        ),
    };
    Ok(storage)
}

/// Wrap a payload in the storage envelope
pub(crate) fn wrap_envelope(data: &Value) -> Value {
    json!({
        "version": STORAGE_VERSION,
        "key": STORAGE_KEY,
        "data": data,
    })
}

/// Names for successive copies kept by `quarantine`
///
/// Yields `<base>.<timestamp>`, then the same with `-1`, `-2`, ... appended
/// for copies made within the same millisecond.
pub(crate) fn backup_names(base: &str) -> impl Iterator<Item = String> {
    let stamped = format!("{}.{}", base, Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
    (0u32..).map(move |n| {
        if n == 0 {
            stamped.clone()
        } else {
            format!("{}-{}", stamped, n)
        }
    })
}

/// Extract the payload from a storage envelope
pub(crate) fn unwrap_envelope(location: &str, envelope: Value) -> StorageResult<Value> {
    let Value::Object(mut map) = envelope else {
        return Err(StorageError::InvalidFormat {
            location: location.to_string(),
            details: "expected a JSON object".to_string(),
        });
    };

    let version = map
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| StorageError::InvalidFormat {
            location: location.to_string(),
            details: "missing storage version".to_string(),
        })?;

    if version > u64::from(STORAGE_VERSION) {
        return Err(StorageError::UnsupportedVersion {
            location: location.to_string(),
            found: version,
            supported: STORAGE_VERSION,
        });
    }

    map.remove("data").ok_or_else(|| StorageError::InvalidFormat {
        location: location.to_string(),
        details: "missing data".to_string(),
    })
}
