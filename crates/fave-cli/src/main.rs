//! fave CLI
//!
//! Command-line interface for fave - per-user favorites management.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fave_core::{Config, FavoritesStore};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "fave")]
#[command(about = "fave - Per-user favorites lists")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User whose favorites to act on (defaults to config default_user)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an entity to the favorites
    Add {
        /// Entity id
        entity_id: String,
        /// Display name override
        #[arg(short, long)]
        name: Option<String>,
        /// Icon override
        #[arg(short, long)]
        icon: Option<String>,
    },
    /// Remove an entity from the favorites
    #[command(alias = "rm")]
    Remove {
        /// Entity id
        entity_id: String,
    },
    /// Add the entity if absent, remove it otherwise
    Toggle {
        /// Entity id
        entity_id: String,
    },
    /// Set or reset the display name of a favorite
    Update {
        /// Entity id
        entity_id: String,
        /// New display name (omit to reset)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Move the given entities to the front, in this order
    Reorder {
        /// Entity ids in the desired order
        entity_ids: Vec<String>,
    },
    /// Remove all favorites of the user
    Clear,
    /// List favorites
    #[command(alias = "ls")]
    List {
        /// List every user's favorites
        #[arg(short, long)]
        all: bool,
    },
    /// Show one favorite
    Show {
        /// Entity id
        entity_id: String,
    },
    /// Show store status and counts
    Status,
    /// Apply service commands given as JSON (reads stdin when omitted or "-")
    Apply {
        /// A JSON command object or array
        input: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, backend, areas_file, default_user, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config doesn't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config =
        Config::load_with_cli_override(cli.config.as_ref()).context("Failed to load configuration")?;
    init_logging(&config);

    let mut store = FavoritesStore::open_with_config(&config)?;
    let _events = output.watch(&store);

    match cli.command {
        Commands::Add {
            entity_id,
            name,
            icon,
        } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::add(&mut store, &user, &entity_id, name, icon, &output)
        }
        Commands::Remove { entity_id } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::remove(&mut store, &user, &entity_id, &output)
        }
        Commands::Toggle { entity_id } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::toggle(&mut store, &user, &entity_id, &output)
        }
        Commands::Update { entity_id, name } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::update(&mut store, &user, &entity_id, name, &output)
        }
        Commands::Reorder { entity_ids } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::reorder(&mut store, &user, &entity_ids, &output)
        }
        Commands::Clear => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::clear(&mut store, &user, &output)
        }
        Commands::List { all: true } => commands::favorite::list_all(&store, &output),
        Commands::List { all: false } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::list(&store, &user, &output)
        }
        Commands::Show { entity_id } => {
            let user = resolve_user(cli.user, &config)?;
            commands::favorite::show(&store, &user, &entity_id, &output)
        }
        Commands::Status => commands::status::show(&store, &config, &output),
        Commands::Apply { input } => commands::apply::run(&mut store, input, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Pick the user from the flag, falling back to the configured default
fn resolve_user(flag: Option<String>, config: &Config) -> Result<String> {
    match flag.or_else(|| config.default_user.clone()) {
        Some(user) if !user.trim().is_empty() => Ok(user),
        _ => bail!(
            "No user given. Pass --user <id> or set one with:\n  \
             fave config set default_user <id>"
        ),
    }
}

/// Initialize logging
///
/// Only initializes if FAVE_LOG environment variable is set.
/// Logs to config.log_file when set, stderr otherwise.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("FAVE_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!("fave_core={},fave_cli={}", log_level, log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let result = match config.log_file {
        Some(ref log_path) => match File::create(log_path) {
            Ok(file) => builder.with_ansi(false).with_writer(file).try_init(),
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                return;
            }
        },
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    // Ignore error if already initialized
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_user_prefers_flag() {
        let config = Config {
            default_user: Some("fallback".to_string()),
            ..Config::default()
        };

        assert_eq!(
            resolve_user(Some("u1".to_string()), &config).unwrap(),
            "u1"
        );
        assert_eq!(resolve_user(None, &config).unwrap(), "fallback");
    }

    #[test]
    fn test_resolve_user_requires_someone() {
        let config = Config::default();
        assert!(resolve_user(None, &config).is_err());
        assert!(resolve_user(Some("  ".to_string()), &config).is_err());
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fave", "add", "light.kitchen", "-u", "u1", "--json"])
            .unwrap();

        assert!(cli.json);
        assert_eq!(cli.user.as_deref(), Some("u1"));
        assert!(matches!(
            cli.command,
            Commands::Add { ref entity_id, name: None, icon: None } if entity_id == "light.kitchen"
        ));
    }

    #[test]
    fn test_parse_reorder_and_list_all() {
        let cli = Cli::try_parse_from(["fave", "reorder", "b", "a"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Reorder { ref entity_ids } if entity_ids == &["b", "a"]
        ));

        let cli = Cli::try_parse_from(["fave", "ls", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::List { all: true }));
    }
}
