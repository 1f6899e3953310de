//! fave Core Library
//!
//! This crate provides the core functionality for fave, a per-user
//! favorites list manager: each user keeps an ordered collection of
//! references to named entities, saved durably after every change.
//!
//! # Architecture
//!
//! - **Store**: owns the in-memory document and all mutation rules
//! - **Storage**: versioned JSON document in a file, SQLite, or memory
//! - **Notifier**: observers get one event per committed mutation
//!
//! All queries are served from the in-memory document.
//!
//! # Quick Start
//!
//! ```text
//! let mut store = FavoritesStore::open_with_config(&Config::load()?)?;
//!
//! store.add("u1", "light.kitchen", None, None)?;
//! store.add("u1", "light.hall", Some("Hallway".into()), None)?;
//!
//! let ids = store.user_entity_ids("u1");
//! ```
//!
//! # Modules
//!
//! - `store`: mutations and load/migration (main entry point)
//! - `query`: read-only views
//! - `command`: service-style JSON commands
//! - `notify`: change observers
//! - `models`: document, item and event types
//! - `storage`: persistence backends
//! - `area`: area lookup used to enrich new favorites
//! - `config`: application configuration

pub mod area;
pub mod command;
pub mod config;
pub mod models;
pub mod notify;
pub mod query;
pub mod storage;
pub mod store;

pub use area::{AreaResolver, FileAreaResolver, StaticAreaResolver};
pub use command::{Command, CommandOutcome};
pub use config::{Backend, Config};
pub use models::{ChangeAction, ChangeEvent, Document, FavoriteItem, LEGACY_USER_ID};
pub use notify::{ChangeNotifier, Subscription};
pub use query::Summary;
pub use storage::{
    DocumentStorage, JsonFileStorage, MemoryStorage, SqliteStorage, StorageError, StorageResult,
};
pub use store::FavoritesStore;
