//! Data models for fave
//!
//! Defines the persisted favorites document, the items it holds, and the
//! change event emitted after every committed mutation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Synthetic user that owns favorites migrated from the single-list format
pub const LEGACY_USER_ID: &str = "migrated_default";

/// Key the document is stored under
pub const STORAGE_KEY: &str = "favorites";

/// Version written into the storage envelope
pub const STORAGE_VERSION: u32 = 1;

/// Name of the change event
pub const EVENT_FAVORITES_CHANGED: &str = "favorites_changed";

/// One user's favorited reference to an entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteItem {
    /// Opaque id of the favorited object, unique within a user's list
    pub entity_id: String,
    /// When the item was favorited. Never changes after creation.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub added_at: DateTime<Utc>,
    /// Position in the user's list, dense from 0
    pub order: u32,
    /// Display name override
    #[serde(default)]
    pub custom_name: Option<String>,
    /// Display icon override (only set when the item is added)
    #[serde(default)]
    pub custom_icon: Option<String>,
    /// Area the entity belonged to when it was added
    #[serde(default)]
    pub area_id: Option<String>,
    /// Fields this version doesn't know about, written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FavoriteItem {
    /// Create a new item stamped with the current time
    pub fn new(entity_id: impl Into<String>, order: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            added_at: Utc::now(),
            order,
            custom_name: None,
            custom_icon: None,
            area_id: None,
            extra: Map::new(),
        }
    }

    /// Name to show for this item
    pub fn display_name(&self) -> &str {
        self.custom_name.as_deref().unwrap_or(&self.entity_id)
    }
}

/// The entire persisted favorites state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Per-user ordered lists. A missing user has no favorites.
    pub users: BTreeMap<String, Vec<FavoriteItem>>,
}

/// Kind of change carried by a [`ChangeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Remove,
    Reorder,
    Clear,
    Update,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Add => "add",
            ChangeAction::Remove => "remove",
            ChangeAction::Reorder => "reorder",
            ChangeAction::Clear => "clear",
            ChangeAction::Update => "update",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted after a mutation has been applied and saved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    pub user_id: String,
    /// Absent for reorder and clear
    pub entity_id: Option<String>,
    /// The user's entity ids after the mutation, in order
    pub favorites: Vec<String>,
}

/// Accepts RFC 3339 and, for older documents, ISO-8601 timestamps with a
/// space separator or no offset. Naive timestamps are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid timestamp '{}'", raw))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_new_item_defaults() {
        let before = Utc::now();
        let item = FavoriteItem::new("light.kitchen", 3);

        assert_eq!(item.entity_id, "light.kitchen");
        assert_eq!(item.order, 3);
        assert!(item.added_at >= before);
        assert!(item.custom_name.is_none());
        assert!(item.custom_icon.is_none());
        assert!(item.area_id.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_entity_id() {
        let mut item = FavoriteItem::new("light.hall", 0);
        assert_eq!(item.display_name(), "light.hall");

        item.custom_name = Some("Hallway".to_string());
        assert_eq!(item.display_name(), "Hallway");
    }

    #[test]
    fn test_item_json_shape() {
        let item = FavoriteItem::new("switch.fan", 0);
        let value = serde_json::to_value(&item).unwrap();

        for key in ["entity_id", "added_at", "order", "custom_name", "custom_icon", "area_id"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert!(value["custom_name"].is_null());
    }

    #[test]
    fn test_naive_timestamp_is_accepted() {
        let item: FavoriteItem = serde_json::from_value(json!({
            "entity_id": "a",
            "added_at": "2024-03-05T10:20:30.123456",
            "order": 0
        }))
        .unwrap();

        assert_eq!(item.added_at.year(), 2024);
        assert_eq!(item.added_at.month(), 3);
        assert_eq!(item.added_at.hour(), 10);
        // Optional fields default to null
        assert!(item.custom_name.is_none());
        assert!(item.area_id.is_none());
    }

    #[test]
    fn test_offset_timestamp_is_normalized_to_utc() {
        let item: FavoriteItem = serde_json::from_value(json!({
            "entity_id": "a",
            "added_at": "2024-03-05T12:00:00+02:00",
            "order": 0
        }))
        .unwrap();

        assert_eq!(item.added_at.hour(), 10);
    }

    #[test]
    fn test_space_separated_timestamps_are_accepted() {
        let naive = parse_timestamp("2024-01-01 00:00:00").unwrap();
        assert_eq!(naive.year(), 2024);
        assert_eq!(naive.hour(), 0);

        let fractional = parse_timestamp("2024-01-01 06:30:15.250").unwrap();
        assert_eq!(fractional.minute(), 30);

        let offset = parse_timestamp("2024-01-01 12:00:00+02:00").unwrap();
        assert_eq!(offset.hour(), 10);
    }

    #[test]
    fn test_unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "entity_id": "a",
            "added_at": "2024-01-01T00:00:00+00:00",
            "order": 0,
            "pinned": true,
            "source": {"kind": "dashboard"}
        });

        let item: FavoriteItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.extra.get("pinned"), Some(&json!(true)));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["pinned"], true);
        assert_eq!(value["source"]["kind"], "dashboard");
        assert_eq!(value["entity_id"], "a");
    }

    #[test]
    fn test_new_item_has_no_extra_fields() {
        let value = serde_json::to_value(FavoriteItem::new("a", 0)).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_garbage_timestamp_is_rejected() {
        let result: Result<FavoriteItem, _> = serde_json::from_value(json!({
            "entity_id": "a",
            "added_at": "yesterday",
            "order": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_serializes_lowercase_action() {
        let event = ChangeEvent {
            action: ChangeAction::Reorder,
            user_id: "u1".to_string(),
            entity_id: None,
            favorites: vec!["a".to_string(), "b".to_string()],
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "reorder");
        assert!(value["entity_id"].is_null());
        assert_eq!(value["favorites"], json!(["a", "b"]));
    }
}
