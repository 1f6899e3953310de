//! In-memory persistence
//!
//! A cloneable handle over shared state: hand one clone to the store and keep
//! another to inspect what was saved or to make saves fail.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::error::{StorageError, StorageResult};
use super::{unwrap_envelope, wrap_envelope, DocumentStorage};

#[derive(Debug, Default)]
struct MemoryState {
    envelope: Option<Value>,
    backups: Vec<Value>,
    saves: usize,
    fail_saves: bool,
}

/// Shared in-memory backend
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a payload already stored, as if saved by an earlier run
    pub fn with_data(data: Value) -> Self {
        Self::with_envelope(wrap_envelope(&data))
    }

    /// Start with a raw envelope (lets tests store arbitrary shapes)
    pub fn with_envelope(envelope: Value) -> Self {
        let storage = Self::default();
        storage.lock().envelope = Some(envelope);
        storage
    }

    /// Make every following save fail (or succeed again)
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// The payload currently stored, if any
    pub fn stored(&self) -> Option<Value> {
        self.lock()
            .envelope
            .as_ref()
            .and_then(|envelope| envelope.get("data").cloned())
    }

    /// The envelope kept aside by the last quarantine
    pub fn backup(&self) -> Option<Value> {
        self.lock().backups.last().cloned()
    }

    /// Every envelope kept aside so far, oldest first
    pub fn backups(&self) -> Vec<Value> {
        self.lock().backups.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // State stays consistent even if a test thread panicked mid-call
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStorage for MemoryStorage {
    fn load(&self) -> StorageResult<Option<Value>> {
        match self.lock().envelope.clone() {
            Some(envelope) => unwrap_envelope(&self.describe(), envelope).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, data: &Value) -> StorageResult<()> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(StorageError::Rejected {
                location: "memory".to_string(),
                details: "saves are disabled".to_string(),
            });
        }
        state.envelope = Some(wrap_envelope(data));
        state.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn quarantine(&mut self) -> StorageResult<Option<String>> {
        let mut state = self.lock();
        let Some(envelope) = state.envelope.clone() else {
            return Ok(None);
        };
        state.backups.push(envelope);
        Ok(Some(format!("memory backup #{}", state.backups.len())))
    }
}
