//! JSON file persistence
//!
//! Handles saving and loading the favorites envelope to/from the filesystem.
//! Uses atomic writes (write to temp file, then rename) to prevent corruption.
//!
//! Storage location: `~/.local/share/fave/favorites.json` (configurable via `Config`)

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::error::{StorageError, StorageResult};
use super::{backup_names, unwrap_envelope, wrap_envelope, DocumentStorage};

/// Persistence backend writing one JSON file
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Create a handler for the given file (the file needn't exist yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a document exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Copies of unreadable documents kept so far, sorted by name
    pub fn backup_paths(&self) -> StorageResult<Vec<PathBuf>> {
        let (Some(dir), Some(prefix)) = (self.path.parent(), self.backup_prefix()) else {
            return Ok(Vec::new());
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_read(e, dir.to_path_buf())),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// File name prefix shared by all backups: `favorites.json.corrupt`
    fn backup_prefix(&self) -> Option<String> {
        let name = self.path.file_name()?.to_str()?;
        Some(format!("{}.corrupt", name))
    }

    /// Create a fresh backup file, never reusing an existing one
    fn create_backup_file(&self) -> StorageResult<(PathBuf, File)> {
        let prefix = self.backup_prefix().unwrap_or_else(|| "favorites.corrupt".to_string());

        for name in backup_names(&prefix) {
            let path = self.path.with_file_name(format!("{}.backup", name));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::from_io(e, path)),
            }
        }
        unreachable!("backup name sequence is unbounded")
    }
}

impl DocumentStorage for JsonFileStorage {
    fn load(&self) -> StorageResult<Option<Value>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::from_read(e, self.path.clone())),
        };

        let envelope: Value =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::InvalidFormat {
                location: self.describe(),
                details: e.to_string(),
            })?;

        unwrap_envelope(&self.describe(), envelope).map(Some)
    }

    fn save(&mut self, data: &Value) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(&wrap_envelope(data))?;
        atomic_write(&self.path, &bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn quarantine(&mut self) -> StorageResult<Option<String>> {
        if !self.exists() {
            return Ok(None);
        }

        let mut source =
            File::open(&self.path).map_err(|e| StorageError::from_read(e, self.path.clone()))?;
        let (backup, mut file) = self.create_backup_file()?;

        io::copy(&mut source, &mut file).map_err(|e| StorageError::from_io(e, backup.clone()))?;
        file.sync_all()
            .map_err(|e| StorageError::from_io(e, backup.clone()))?;

        Ok(Some(backup.display().to_string()))
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
    }

    // Same directory, so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
