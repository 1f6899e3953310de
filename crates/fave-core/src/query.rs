//! Read-only views over the store
//!
//! Everything here returns owned copies, so callers can hold on to results
//! across later mutations without ever seeing store internals change.
//! None of these touch storage.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::FavoriteItem;
use crate::store::FavoritesStore;

/// Snapshot of all favorites plus the total count
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub users: BTreeMap<String, Vec<FavoriteItem>>,
    pub count: usize,
}

impl FavoritesStore {
    /// Copy of every user's list
    pub fn users(&self) -> BTreeMap<String, Vec<FavoriteItem>> {
        self.doc.users.clone()
    }

    /// Copy of one user's list (empty for unknown users)
    pub fn user_items(&self, user_id: &str) -> Vec<FavoriteItem> {
        self.list(user_id).to_vec()
    }

    /// One user's favorited entity ids, in order
    pub fn user_entity_ids(&self, user_id: &str) -> Vec<String> {
        self.list(user_id)
            .iter()
            .map(|item| item.entity_id.clone())
            .collect()
    }

    pub fn is_favorite(&self, user_id: &str, entity_id: &str) -> bool {
        self.list(user_id)
            .iter()
            .any(|item| item.entity_id == entity_id)
    }

    pub fn get_item(&self, user_id: &str, entity_id: &str) -> Option<FavoriteItem> {
        self.list(user_id)
            .iter()
            .find(|item| item.entity_id == entity_id)
            .cloned()
    }

    /// Favorites across all users
    pub fn total_count(&self) -> usize {
        self.doc.users.values().map(Vec::len).sum()
    }

    /// Whether any user has at least one favorite
    pub fn has_favorites(&self) -> bool {
        self.doc.users.values().any(|items| !items.is_empty())
    }

    /// Users with an entry, including cleared ones
    pub fn user_count(&self) -> usize {
        self.doc.users.len()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            users: self.users(),
            count: self.total_count(),
        }
    }
}
