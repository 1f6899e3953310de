//! Service-style command surface
//!
//! Commands arrive as JSON objects tagged by `service`, the way a host's
//! service-call layer delivers them:
//!
//! ```json
//! {"service": "add", "user_id": "u1", "entity_id": "light.kitchen", "custom_name": "Kitchen"}
//! {"service": "reorder", "user_id": "u1", "entity_ids": ["light.hall", "light.kitchen"]}
//! ```
//!
//! `entity_ids` also accepts a single string. A missing or null
//! `custom_name` on `update` resets the display name.

use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::StorageResult;
use crate::store::FavoritesStore;

/// One mutation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "lowercase")]
pub enum Command {
    Add {
        user_id: String,
        entity_id: String,
        #[serde(default)]
        custom_name: Option<String>,
        #[serde(default)]
        custom_icon: Option<String>,
    },
    Remove {
        user_id: String,
        entity_id: String,
    },
    Toggle {
        user_id: String,
        entity_id: String,
    },
    Reorder {
        user_id: String,
        #[serde(deserialize_with = "one_or_many")]
        entity_ids: Vec<String>,
    },
    Clear {
        user_id: String,
    },
    Update {
        user_id: String,
        entity_id: String,
        #[serde(default)]
        custom_name: Option<String>,
    },
}

/// What a dispatched command did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    /// Whether state changed (and was saved)
    pub changed: bool,
    /// Resulting favorite state, for commands about a single entity
    pub favorited: Option<bool>,
}

impl Command {
    /// Parse one command or a JSON array of commands
    pub fn from_json(input: &str) -> serde_json::Result<Vec<Command>> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Batch {
            Many(Vec<Command>),
            One(Command),
        }

        Ok(match serde_json::from_str(input)? {
            Batch::Many(commands) => commands,
            Batch::One(command) => vec![command],
        })
    }

    pub fn service(&self) -> &'static str {
        match self {
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::Toggle { .. } => "toggle",
            Command::Reorder { .. } => "reorder",
            Command::Clear { .. } => "clear",
            Command::Update { .. } => "update",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Command::Add { user_id, .. }
            | Command::Remove { user_id, .. }
            | Command::Toggle { user_id, .. }
            | Command::Reorder { user_id, .. }
            | Command::Clear { user_id }
            | Command::Update { user_id, .. } => user_id,
        }
    }
}

impl FavoritesStore {
    /// Apply a command
    pub fn dispatch(&mut self, command: Command) -> StorageResult<CommandOutcome> {
        let outcome = match command {
            Command::Add {
                user_id,
                entity_id,
                custom_name,
                custom_icon,
            } => {
                let changed = self.add(&user_id, &entity_id, custom_name, custom_icon)?;
                CommandOutcome {
                    changed,
                    favorited: Some(true),
                }
            }
            Command::Remove { user_id, entity_id } => {
                let changed = self.remove(&user_id, &entity_id)?;
                CommandOutcome {
                    changed,
                    favorited: Some(false),
                }
            }
            Command::Toggle { user_id, entity_id } => {
                let favorited = self.toggle(&user_id, &entity_id)?;
                CommandOutcome {
                    changed: true,
                    favorited: Some(favorited),
                }
            }
            Command::Reorder {
                user_id,
                entity_ids,
            } => CommandOutcome {
                changed: self.reorder(&user_id, entity_ids.as_slice())?,
                favorited: None,
            },
            Command::Clear { user_id } => {
                self.clear(&user_id)?;
                CommandOutcome {
                    changed: true,
                    favorited: None,
                }
            }
            Command::Update {
                user_id,
                entity_id,
                custom_name,
            } => {
                let changed = self.update(&user_id, &entity_id, custom_name)?;
                CommandOutcome {
                    changed,
                    favorited: changed.then_some(true),
                }
            }
        };
        Ok(outcome)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(id) => vec![id],
        OneOrMany::Many(ids) => ids,
    })
}
