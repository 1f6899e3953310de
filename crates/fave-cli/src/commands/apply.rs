//! Apply command handler

use std::io::Read;

use anyhow::{Context, Result};

use fave_core::{Command, FavoritesStore};

use crate::output::{Output, OutputFormat};

/// Apply JSON service commands, in order, stopping at the first failure
pub fn run(store: &mut FavoritesStore, input: Option<String>, output: &Output) -> Result<()> {
    let input = match input {
        Some(text) if text != "-" => text,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read commands from stdin")?;
            text
        }
    };

    let commands = parse(&input)?;
    let total = commands.len();

    for (index, command) in commands.into_iter().enumerate() {
        let service = command.service();
        let user = command.user_id().to_string();

        let outcome = store
            .dispatch(command)
            .with_context(|| format!("Command {} of {} ({}) failed", index + 1, total, service))?;

        match output.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "service": service,
                        "user_id": user,
                        "result": outcome,
                    })
                );
            }
            OutputFormat::Quiet => {}
            OutputFormat::Human => {
                let status = if outcome.changed { "changed" } else { "unchanged" };
                println!("{} ({}): {}", service, user, status);
            }
        }
    }

    output.success(&format!("Applied {} command(s)", total));
    Ok(())
}

fn parse(input: &str) -> Result<Vec<Command>> {
    Command::from_json(input.trim()).context("Invalid command JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fave_core::MemoryStorage;

    #[test]
    fn test_apply_inline_batch() {
        let mut store = FavoritesStore::load(Box::new(MemoryStorage::new()), None).unwrap();
        let input = r#"[
            {"service": "add", "user_id": "u1", "entity_id": "a"},
            {"service": "add", "user_id": "u1", "entity_id": "b"},
            {"service": "reorder", "user_id": "u1", "entity_ids": "b"}
        ]"#;

        run(&mut store, Some(input.to_string()), &Output::new(OutputFormat::Quiet)).unwrap();

        assert_eq!(store.user_entity_ids("u1"), vec!["b", "a"]);
    }

    #[test]
    fn test_apply_stops_at_failure() {
        let storage = MemoryStorage::new();
        let mut store = FavoritesStore::load(Box::new(storage.clone()), None).unwrap();
        store.add("u1", "a", None, None).unwrap();
        storage.fail_saves(true);

        let input = r#"{"service": "clear", "user_id": "u1"}"#;
        let err = run(
            &mut store,
            Some(input.to_string()),
            &Output::new(OutputFormat::Quiet),
        )
        .unwrap_err();

        assert!(err.to_string().contains("Command 1 of 1 (clear) failed"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("not json").is_err());
        assert_eq!(parse("  []\n").unwrap().len(), 0);
    }
}
