//! Favorites store
//!
//! The `FavoritesStore` owns the favorites document and coordinates between:
//! - the persistence backend (durable copy)
//! - the area resolver (best-effort enrichment on add)
//! - the change notifier (one event per committed mutation)
//!
//! ## Mutations
//!
//! Every mutation builds the affected user's new list and swaps it in whole,
//! so a reader never sees a half-updated list. The document is then saved and,
//! only if the save succeeded, a [`ChangeEvent`] is emitted.
//!
//! A failed save is returned to the caller as a
//! [`StorageError`](crate::storage::StorageError). The change
//! stays applied in memory; call [`FavoritesStore::save`] to retry or
//! [`FavoritesStore::reload`] to go back to what is on disk.
//!
//! Rejected mutations (duplicate add, unknown entity on remove/update) return
//! `Ok(false)` and touch neither storage nor observers.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = FavoritesStore::open_with_config(&config)?;
//! let _sub = store.subscribe(|event| println!("{:?}", event));
//!
//! store.add("u1", "light.kitchen", None, None)?;
//! store.reorder("u1", &["light.hall"])?;
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::area::{AreaResolver, FileAreaResolver};
use crate::config::Config;
use crate::models::{ChangeAction, ChangeEvent, Document, FavoriteItem, LEGACY_USER_ID};
use crate::notify::{ChangeNotifier, Subscription};
use crate::storage::{open_storage, DocumentStorage, StorageResult};

/// Per-user ordered favorites backed by durable storage
pub struct FavoritesStore {
    /// The canonical in-memory document
    pub(crate) doc: Document,
    /// Persistence backend
    storage: Box<dyn DocumentStorage>,
    /// Area lookup used when adding (optional)
    areas: Option<Box<dyn AreaResolver>>,
    /// Observers of committed mutations
    notifier: ChangeNotifier,
}

/// What a stored payload turned out to be
enum Loaded {
    Empty,
    /// Per-user document, with the number of unreadable entries left out
    Current(Document, usize),
    /// Flat legacy list moved under the sentinel user
    Legacy(Document, usize),
    Malformed(String),
}

impl FavoritesStore {
    /// Open the store described by the configuration
    ///
    /// Uses the configured backend and the file-backed area registry.
    pub fn open_with_config(config: &Config) -> Result<Self> {
        let storage = open_storage(config)?;
        let areas: Box<dyn AreaResolver> = Box::new(FileAreaResolver::new(config.areas_path()));

        Self::load(storage, Some(areas)).context("Failed to load favorites")
    }

    /// Build a store over `storage` and load whatever it holds
    ///
    /// - Nothing stored: start empty
    /// - Current format: adopt it
    /// - Legacy flat list: move it under [`LEGACY_USER_ID`] and save immediately
    /// - Unreadable lists or items: leave them out, keep the rest, back up the original
    /// - Anything else unreadable: keep a backup if the backend can, start empty
    ///
    /// Only backend failures (I/O, database) are returned as errors.
    pub fn load(
        storage: Box<dyn DocumentStorage>,
        areas: Option<Box<dyn AreaResolver>>,
    ) -> StorageResult<Self> {
        let mut store = Self {
            doc: Document::default(),
            storage,
            areas,
            notifier: ChangeNotifier::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Discard in-memory state and load again from storage
    pub fn reload(&mut self) -> StorageResult<()> {
        let loaded = match self.storage.load() {
            Ok(raw) => interpret(raw),
            Err(e) if e.is_malformed() => Loaded::Malformed(e.to_string()),
            Err(e) => return Err(e),
        };

        match loaded {
            Loaded::Empty => {
                self.doc = Document::default();
            }
            Loaded::Current(doc, dropped) => {
                debug!("Loaded favorites for {} user(s)", doc.users.len());
                if dropped > 0 {
                    self.keep_backup(dropped);
                }
                self.doc = doc;
            }
            Loaded::Legacy(doc, dropped) => {
                info!("Migrating favorites to per-user format");
                if dropped > 0 {
                    self.keep_backup(dropped);
                }
                self.doc = doc;
                self.persist()?;
            }
            Loaded::Malformed(details) => {
                warn!(
                    "Favorites at {} are unreadable, starting empty: {}",
                    self.storage.describe(),
                    details
                );
                self.quarantine();
                self.doc = Document::default();
            }
        }

        Ok(())
    }

    /// Save the current document
    ///
    /// Mutations save on their own; this is for retrying after a failed save.
    pub fn save(&mut self) -> StorageResult<()> {
        self.persist()
    }

    /// Where the backend keeps the document
    pub fn storage_location(&self) -> String {
        self.storage.describe()
    }

    // ==================== Observers ====================

    /// Register a change handler
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    // ==================== Mutations ====================

    /// Add an entity to the end of a user's favorites
    ///
    /// Returns `false` without saving if it is already a favorite.
    pub fn add(
        &mut self,
        user_id: &str,
        entity_id: &str,
        custom_name: Option<String>,
        custom_icon: Option<String>,
    ) -> StorageResult<bool> {
        if self.is_favorite(user_id, entity_id) {
            debug!("{} is already a favorite for user {}", entity_id, user_id);
            return Ok(false);
        }

        let area_id = self.resolve_area(entity_id);
        let current = self.list(user_id);

        let mut item = FavoriteItem::new(entity_id, current.len() as u32);
        item.custom_name = non_empty(custom_name);
        item.custom_icon = non_empty(custom_icon);
        item.area_id = area_id;

        let mut items = current.to_vec();
        items.push(item);
        self.replace_list(user_id, items);

        self.commit(ChangeAction::Add, user_id, Some(entity_id))?;
        info!("Added {} to favorites for user {}", entity_id, user_id);
        Ok(true)
    }

    /// Remove an entity and renumber the rest
    ///
    /// Returns `false` without saving if the user has no such favorite.
    pub fn remove(&mut self, user_id: &str, entity_id: &str) -> StorageResult<bool> {
        let Some(current) = self.doc.users.get(user_id) else {
            debug!("No favorites for user {}, nothing to remove", user_id);
            return Ok(false);
        };

        if !current.iter().any(|item| item.entity_id == entity_id) {
            debug!("{} is not a favorite for user {}", entity_id, user_id);
            return Ok(false);
        }

        let items = renumber(
            current
                .iter()
                .filter(|item| item.entity_id != entity_id)
                .cloned(),
        );
        self.replace_list(user_id, items);

        self.commit(ChangeAction::Remove, user_id, Some(entity_id))?;
        info!("Removed {} from favorites for user {}", entity_id, user_id);
        Ok(true)
    }

    /// Flip an entity's favorite state
    ///
    /// Returns the resulting state: `true` if it is now a favorite.
    pub fn toggle(&mut self, user_id: &str, entity_id: &str) -> StorageResult<bool> {
        let favorited = if self.is_favorite(user_id, entity_id) {
            self.remove(user_id, entity_id)?;
            false
        } else {
            self.add(user_id, entity_id, None, None)?;
            true
        };

        info!(
            "Toggled {} for user {} - now {}",
            entity_id,
            user_id,
            if favorited { "favorited" } else { "not favorited" }
        );
        Ok(favorited)
    }

    /// Move the named entities to the front, in the given order
    ///
    /// Unknown ids are ignored and items not named keep their relative order
    /// after the named ones. Saves even when nothing moved. Returns `false`
    /// (and does nothing) if the user has no favorites list.
    pub fn reorder<S: AsRef<str>>(
        &mut self,
        user_id: &str,
        entity_ids: &[S],
    ) -> StorageResult<bool> {
        let Some(current) = self.doc.users.get(user_id) else {
            debug!("No favorites for user {}, nothing to reorder", user_id);
            return Ok(false);
        };

        let mut placed = vec![false; current.len()];
        let mut ordered = Vec::with_capacity(current.len());

        for entity_id in entity_ids {
            let entity_id = entity_id.as_ref();
            if let Some(pos) = current.iter().position(|item| item.entity_id == entity_id) {
                if !placed[pos] {
                    placed[pos] = true;
                    ordered.push(current[pos].clone());
                }
            }
        }

        ordered.extend(
            current
                .iter()
                .zip(&placed)
                .filter(|(_, placed)| !**placed)
                .map(|(item, _)| item.clone()),
        );

        let items = renumber(ordered);
        self.replace_list(user_id, items);

        self.commit(ChangeAction::Reorder, user_id, None)?;
        info!("Reordered favorites for user {}", user_id);
        Ok(true)
    }

    /// Remove all of a user's favorites
    ///
    /// Always saves, leaving an empty list for the user.
    pub fn clear(&mut self, user_id: &str) -> StorageResult<()> {
        self.replace_list(user_id, Vec::new());

        self.commit(ChangeAction::Clear, user_id, None)?;
        info!("Cleared all favorites for user {}", user_id);
        Ok(())
    }

    /// Set or reset (with `None` or an empty name) a favorite's display name
    ///
    /// Returns `false` without saving if the user has no such favorite.
    pub fn update(
        &mut self,
        user_id: &str,
        entity_id: &str,
        custom_name: Option<String>,
    ) -> StorageResult<bool> {
        let Some(current) = self.doc.users.get(user_id) else {
            debug!("No favorites for user {}, nothing to update", user_id);
            return Ok(false);
        };

        let Some(pos) = current.iter().position(|item| item.entity_id == entity_id) else {
            debug!("{} is not a favorite for user {}", entity_id, user_id);
            return Ok(false);
        };

        let custom_name = non_empty(custom_name);
        let mut items = current.clone();
        items[pos].custom_name = custom_name.clone();
        self.replace_list(user_id, items);

        self.commit(ChangeAction::Update, user_id, Some(entity_id))?;
        info!(
            "Updated {} for user {} - name: {}",
            entity_id,
            user_id,
            custom_name.as_deref().unwrap_or("(default)")
        );
        Ok(true)
    }

    // ==================== Internals ====================

    /// Copy the stored document aside before entries get dropped from it
    fn keep_backup(&mut self, dropped: usize) {
        warn!(
            "Left out {} unreadable favorite entr{} from {}",
            dropped,
            if dropped == 1 { "y" } else { "ies" },
            self.storage.describe()
        );
        self.quarantine();
    }

    fn quarantine(&mut self) {
        match self.storage.quarantine() {
            Ok(Some(backup)) => warn!("Unreadable favorites copied to {}", backup),
            Ok(None) => {}
            Err(e) => warn!("Could not back up unreadable favorites: {}", e),
        }
    }

    /// A user's items, empty if the user is unknown
    pub(crate) fn list(&self, user_id: &str) -> &[FavoriteItem] {
        self.doc
            .users
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn replace_list(&mut self, user_id: &str, items: Vec<FavoriteItem>) {
        self.doc.users.insert(user_id.to_string(), items);
    }

    fn resolve_area(&self, entity_id: &str) -> Option<String> {
        let resolver = self.areas.as_ref()?;
        match resolver.resolve(entity_id) {
            Ok(area_id) => area_id,
            Err(e) => {
                debug!("Area lookup for {} failed: {:#}", entity_id, e);
                None
            }
        }
    }

    fn persist(&mut self) -> StorageResult<()> {
        let data = serde_json::to_value(&self.doc)?;
        self.storage.save(&data).inspect_err(|e| {
            warn!(
                "Failed to save favorites to {}: {}",
                self.storage.describe(),
                e
            )
        })
    }

    /// Save, then tell observers
    fn commit(
        &mut self,
        action: ChangeAction,
        user_id: &str,
        entity_id: Option<&str>,
    ) -> StorageResult<()> {
        self.persist()?;

        let event = ChangeEvent {
            action,
            user_id: user_id.to_string(),
            entity_id: entity_id.map(str::to_string),
            favorites: self.list(user_id).iter().map(|i| i.entity_id.clone()).collect(),
        };
        self.notifier.emit(&event);
        Ok(())
    }
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore")
            .field("storage", &self.storage.describe())
            .field("users", &self.doc.users.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}

/// Decide which document shape a stored payload has
///
/// Lists and items are read one by one: an unreadable entry is left out
/// and counted, the rest of the document is kept.
fn interpret(raw: Option<Value>) -> Loaded {
    let Some(raw) = raw else {
        return Loaded::Empty;
    };

    let Value::Object(mut map) = raw else {
        return Loaded::Malformed("document is not an object".to_string());
    };

    if map.is_empty() {
        return Loaded::Empty;
    }

    if let Some(users) = map.remove("users") {
        let Value::Object(users) = users else {
            return Loaded::Malformed("'users' is not an object".to_string());
        };

        let mut doc = Document::default();
        let mut dropped = 0;
        for (user_id, list) in users {
            if let Some(items) = read_items(&user_id, list, &mut dropped) {
                doc.users.insert(user_id, items);
            }
        }
        return Loaded::Current(doc, dropped);
    }

    if let Some(items) = map.remove("items") {
        let mut dropped = 0;
        let Some(items) = read_items(LEGACY_USER_ID, items, &mut dropped) else {
            return Loaded::Malformed("'items' is not a list".to_string());
        };

        let mut doc = Document::default();
        doc.users.insert(LEGACY_USER_ID.to_string(), items);
        return Loaded::Legacy(doc, dropped);
    }

    Loaded::Malformed("neither 'users' nor 'items' present".to_string())
}

/// Read one user's list, leaving out items that don't parse
///
/// Returns `None` if `list` isn't a list at all.
fn read_items(user_id: &str, list: Value, dropped: &mut usize) -> Option<Vec<FavoriteItem>> {
    let Value::Array(raw_items) = list else {
        warn!("Favorites of user {} are not a list, leaving them out", user_id);
        *dropped += 1;
        return None;
    };

    let items = raw_items
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<FavoriteItem>(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Leaving out unreadable favorite of user {}: {}", user_id, e);
                *dropped += 1;
                None
            }
        })
        .collect();
    Some(items)
}

/// Assign dense `order` values in iteration order
fn renumber(items: impl IntoIterator<Item = FavoriteItem>) -> Vec<FavoriteItem> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            item.order = i as u32;
            item
        })
        .collect()
}

/// Empty names count as no name
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
