//! Status command handler

use anyhow::Result;

use fave_core::{Config, FavoritesStore};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &FavoritesStore, config: &Config, output: &Output) -> Result<()> {
    let summary = store.summary();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": config.backend,
                    "storage": store.storage_location(),
                    "areas_file": config.areas_path(),
                    "has_favorites": store.has_favorites(),
                    "counts": {
                        "users": store.user_count(),
                        "favorites": summary.count,
                    },
                    "per_user": summary
                        .users
                        .iter()
                        .map(|(user, items)| (user.clone(), items.len()))
                        .collect::<std::collections::BTreeMap<_, _>>(),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", summary.count);
        }
        OutputFormat::Human => {
            println!("fave Status");
            println!("===========");
            println!();
            println!("Storage:");
            println!("  Backend:  {}", config.backend);
            println!("  Location: {}", store.storage_location());
            println!("  Areas:    {}", config.areas_path().display());
            println!();
            println!("Contents:");
            println!("  Users:     {}", store.user_count());
            println!("  Favorites: {}", summary.count);
            for (user, items) in &summary.users {
                println!("    {}: {}", user, items.len());
            }
        }
    }

    Ok(())
}
