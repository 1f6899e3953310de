//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::collections::BTreeMap;

use fave_core::models::EVENT_FAVORITES_CHANGED;
use fave_core::{ChangeEvent, FavoriteItem, FavoritesStore, Subscription};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print every change event the store emits while the subscription lives
    pub fn watch(&self, store: &FavoritesStore) -> Subscription {
        let output = *self;
        store.subscribe(move |event| output.print_event(event))
    }

    /// Print a change event
    pub fn print_event(&self, event: &ChangeEvent) {
        match self.format {
            OutputFormat::Human => {
                let list = if event.favorites.is_empty() {
                    "(none)".to_string()
                } else {
                    event.favorites.join(", ")
                };
                println!("  {} favorites: {}", event.user_id, list);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": EVENT_FAVORITES_CHANGED,
                        "data": event,
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a single favorite
    pub fn print_item(&self, item: &FavoriteItem) {
        match self.format {
            OutputFormat::Human => {
                println!("Entity:   {}", item.entity_id);
                println!("Name:     {}", item.display_name());
                if let Some(ref icon) = item.custom_icon {
                    println!("Icon:     {}", icon);
                }
                if let Some(ref area) = item.area_id {
                    println!("Area:     {}", area);
                }
                println!("Position: {}", item.order);
                println!("Added:    {}", item.added_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(item),
            OutputFormat::Quiet => {
                println!("{}", item.entity_id);
            }
        }
    }

    /// Print one user's favorites
    pub fn print_items(&self, user_id: &str, items: &[FavoriteItem]) {
        match self.format {
            OutputFormat::Human => {
                if items.is_empty() {
                    println!("No favorites for {}.", user_id);
                    return;
                }
                for item in items {
                    println!("{}", item_line(item));
                }
                println!("\n{} favorite(s)", items.len());
            }
            OutputFormat::Json => print_json(&items),
            OutputFormat::Quiet => {
                for item in items {
                    println!("{}", item.entity_id);
                }
            }
        }
    }

    /// Print all users' favorites
    pub fn print_users(&self, users: &BTreeMap<String, Vec<FavoriteItem>>) {
        match self.format {
            OutputFormat::Human => {
                if users.is_empty() {
                    println!("No favorites found.");
                    return;
                }
                for (user_id, items) in users {
                    println!("── {} ({}) ──", user_id, items.len());
                    for item in items {
                        println!("{}", item_line(item));
                    }
                    println!();
                }
                let total: usize = users.values().map(Vec::len).sum();
                println!("{} favorite(s) across {} user(s)", total, users.len());
            }
            OutputFormat::Json => print_json(users),
            OutputFormat::Quiet => {
                for (user_id, items) in users {
                    for item in items {
                        println!("{}\t{}", user_id, item.entity_id);
                    }
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// One list row: position, entity, display name if overridden, area
fn item_line(item: &FavoriteItem) -> String {
    let mut line = format!("{:>3}. {}", item.order, truncate(&item.entity_id, 40));
    if item.custom_name.is_some() {
        line.push_str(&format!(" \"{}\"", truncate(item.display_name(), 30)));
    }
    if let Some(ref area) = item.area_id {
        line.push_str(&format!(" [{}]", area));
    }
    line
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ääääääääääää", 5), "ää...");
    }

    #[test]
    fn test_item_line() {
        let mut item = FavoriteItem::new("light.kitchen", 2);
        assert_eq!(item_line(&item), "  2. light.kitchen");

        item.custom_name = Some("Kitchen".to_string());
        item.area_id = Some("downstairs".to_string());
        assert_eq!(item_line(&item), "  2. light.kitchen \"Kitchen\" [downstairs]");
    }
}
