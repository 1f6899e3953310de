//! Area lookup
//!
//! Favorites are enriched with the area their entity lives in when they are
//! added. The lookup is best-effort: the store swallows any error from it.
//!
//! The file-backed registry is a TOML table:
//!
//! ```toml
//! [areas]
//! "light.kitchen" = "kitchen"
//! "light.hall" = "hallway"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Resolves an entity id to the area it belongs to
pub trait AreaResolver: Send {
    fn resolve(&self, entity_id: &str) -> Result<Option<String>>;
}

/// Fixed in-memory mapping
#[derive(Debug, Clone, Default)]
pub struct StaticAreaResolver {
    areas: HashMap<String, String>,
}

impl StaticAreaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, entity_id: impl Into<String>, area_id: impl Into<String>) -> Self {
        self.areas.insert(entity_id.into(), area_id.into());
        self
    }
}

impl AreaResolver for StaticAreaResolver {
    fn resolve(&self, entity_id: &str) -> Result<Option<String>> {
        Ok(self.areas.get(entity_id).cloned())
    }
}

impl FromIterator<(String, String)> for StaticAreaResolver {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            areas: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AreaFile {
    #[serde(default)]
    areas: HashMap<String, String>,
}

/// Registry read from a TOML file on every lookup, so edits apply immediately
#[derive(Debug, Clone)]
pub struct FileAreaResolver {
    path: PathBuf,
}

impl FileAreaResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AreaResolver for FileAreaResolver {
    fn resolve(&self, entity_id: &str) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read area registry: {:?}", self.path))?;
        let mut file: AreaFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse area registry: {:?}", self.path))?;

        Ok(file.areas.remove(entity_id))
    }
}
