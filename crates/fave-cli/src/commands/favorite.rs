//! Favorite command handlers

use anyhow::{Context, Result};

use fave_core::FavoritesStore;

use crate::output::Output;

/// Add a favorite
pub fn add(
    store: &mut FavoritesStore,
    user: &str,
    entity_id: &str,
    name: Option<String>,
    icon: Option<String>,
    output: &Output,
) -> Result<()> {
    let added = store
        .add(user, entity_id, name, icon)
        .context("Failed to add favorite")?;

    if added {
        output.success(&format!("Added {} to favorites of {}", entity_id, user));
    } else {
        output.message(&format!("{} is already a favorite of {}", entity_id, user));
    }
    Ok(())
}

/// Remove a favorite
pub fn remove(
    store: &mut FavoritesStore,
    user: &str,
    entity_id: &str,
    output: &Output,
) -> Result<()> {
    let removed = store
        .remove(user, entity_id)
        .context("Failed to remove favorite")?;

    if removed {
        output.success(&format!("Removed {} from favorites of {}", entity_id, user));
    } else {
        output.message(&format!("{} is not a favorite of {}", entity_id, user));
    }
    Ok(())
}

/// Toggle a favorite
pub fn toggle(
    store: &mut FavoritesStore,
    user: &str,
    entity_id: &str,
    output: &Output,
) -> Result<()> {
    let favorited = store
        .toggle(user, entity_id)
        .context("Failed to toggle favorite")?;

    let state = if favorited { "on" } else { "off" };
    output.success(&format!("{} is now {} for {}", entity_id, state, user));
    Ok(())
}

/// Set or reset a display name
pub fn update(
    store: &mut FavoritesStore,
    user: &str,
    entity_id: &str,
    name: Option<String>,
    output: &Output,
) -> Result<()> {
    let reset = name.as_deref().map_or(true, str::is_empty);
    let updated = store
        .update(user, entity_id, name)
        .context("Failed to update favorite")?;

    if !updated {
        output.message(&format!("{} is not a favorite of {}", entity_id, user));
    } else if reset {
        output.success(&format!("Reset name of {}", entity_id));
    } else {
        output.success(&format!("Renamed {}", entity_id));
    }
    Ok(())
}

/// Reorder a user's favorites
pub fn reorder(
    store: &mut FavoritesStore,
    user: &str,
    entity_ids: &[String],
    output: &Output,
) -> Result<()> {
    let reordered = store
        .reorder(user, entity_ids)
        .context("Failed to reorder favorites")?;

    if reordered {
        output.success(&format!("Reordered favorites of {}", user));
    } else {
        output.message(&format!("{} has no favorites", user));
    }
    Ok(())
}

/// Clear a user's favorites
pub fn clear(store: &mut FavoritesStore, user: &str, output: &Output) -> Result<()> {
    store.clear(user).context("Failed to clear favorites")?;
    output.success(&format!("Cleared favorites of {}", user));
    Ok(())
}

/// List one user's favorites
pub fn list(store: &FavoritesStore, user: &str, output: &Output) -> Result<()> {
    output.print_items(user, &store.user_items(user));
    Ok(())
}

/// List every user's favorites
pub fn list_all(store: &FavoritesStore, output: &Output) -> Result<()> {
    output.print_users(&store.users());
    Ok(())
}

/// Show one favorite
pub fn show(store: &FavoritesStore, user: &str, entity_id: &str, output: &Output) -> Result<()> {
    let item = store
        .get_item(user, entity_id)
        .ok_or_else(|| anyhow::anyhow!("{} is not a favorite of {}", entity_id, user))?;

    output.print_item(&item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use fave_core::MemoryStorage;

    fn store() -> (FavoritesStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = FavoritesStore::load(Box::new(storage.clone()), None).unwrap();
        (store, storage)
    }

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_handlers_drive_store() {
        let (mut store, storage) = store();
        let output = quiet();

        add(&mut store, "u1", "a", Some("Alpha".into()), None, &output).unwrap();
        add(&mut store, "u1", "b", None, None, &output).unwrap();
        reorder(&mut store, "u1", &["b".to_string()], &output).unwrap();
        toggle(&mut store, "u1", "a", &output).unwrap();

        assert_eq!(store.user_entity_ids("u1"), vec!["b"]);
        assert_eq!(storage.save_count(), 4);

        update(&mut store, "u1", "b", Some("Bee".into()), &output).unwrap();
        assert_eq!(
            store.get_item("u1", "b").unwrap().custom_name.as_deref(),
            Some("Bee")
        );

        clear(&mut store, "u1", &output).unwrap();
        assert!(store.user_items("u1").is_empty());
    }

    #[test]
    fn test_noops_are_not_errors() {
        let (mut store, storage) = store();
        let output = quiet();

        remove(&mut store, "u1", "a", &output).unwrap();
        update(&mut store, "u1", "a", None, &output).unwrap();
        reorder(&mut store, "u1", &[], &output).unwrap();

        assert_eq!(storage.save_count(), 0);
    }

    #[test]
    fn test_show_missing_is_error() {
        let (store, _) = store();
        assert!(show(&store, "u1", "a", &quiet()).is_err());
    }

    #[test]
    fn test_save_failure_surfaces() {
        let (mut store, storage) = store();
        storage.fail_saves(true);

        let err = add(&mut store, "u1", "a", None, None, &quiet()).unwrap_err();
        assert!(err.to_string().contains("Failed to add favorite"));
    }
}
