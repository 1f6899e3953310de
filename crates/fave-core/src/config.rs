//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/fave/config.toml)
//! 3. Environment variables (FAVE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "FAVE";

/// Which persistence adapter backs the favorites document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single JSON file, written atomically
    #[default]
    Json,
    /// Key-value row in a SQLite database
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Json => f.write_str("json"),
            Backend::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" => Ok(Backend::Sqlite),
            other => bail!("Unknown backend '{}'. Use 'json' or 'sqlite'.", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (favorites document, SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Persistence backend
    #[serde(default)]
    pub backend: Backend,

    /// TOML file mapping entity ids to area ids (optional)
    #[serde(default)]
    pub areas_file: Option<PathBuf>,

    /// User id used when a command doesn't name one
    #[serde(default)]
    pub default_user: Option<String>,

    /// Log file path (defaults to stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
            areas_file: None,
            default_user: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (FAVE_DATA_DIR, FAVE_BACKEND, FAVE_AREAS_FILE, FAVE_USER)
    /// 2. Config file (~/.config/fave/config.toml or FAVE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_BACKEND", ENV_PREFIX)) {
            self.backend = val
                .parse()
                .with_context(|| format!("Invalid {}_BACKEND", ENV_PREFIX))?;
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_AREAS_FILE", ENV_PREFIX)) {
            self.areas_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_USER", ENV_PREFIX)) {
            self.default_user = if val.is_empty() { None } else { Some(val) };
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with FAVE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fave")
            .join("config.toml")
    }

    /// Get the path to the JSON favorites document
    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join("favorites.json")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("favorites.db")
    }

    /// Area registry used when `areas_file` isn't set
    pub fn default_areas_path(&self) -> PathBuf {
        self.data_dir.join("areas.toml")
    }

    /// Effective area registry path
    pub fn areas_path(&self) -> PathBuf {
        self.areas_file
            .clone()
            .unwrap_or_else(|| self.default_areas_path())
    }

    /// Where the active backend keeps its data
    pub fn storage_path(&self) -> PathBuf {
        match self.backend {
            Backend::Json => self.document_path(),
            Backend::Sqlite => self.sqlite_path(),
        }
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fave")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "FAVE_DATA_DIR",
        "FAVE_BACKEND",
        "FAVE_AREAS_FILE",
        "FAVE_USER",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Json);
        assert!(config.areas_file.is_none());
        assert!(config.default_user.is_none());
        assert!(config.data_dir.ends_with("fave"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();

        assert!(config.document_path().ends_with("favorites.json"));
        assert!(config.sqlite_path().ends_with("favorites.db"));
        assert!(config.areas_path().ends_with("areas.toml"));
        assert_eq!(config.storage_path(), config.document_path());
    }

    #[test]
    fn test_storage_path_follows_backend() {
        let config = Config {
            backend: Backend::Sqlite,
            ..Config::default()
        };
        assert_eq!(config.storage_path(), config.sqlite_path());
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("FAVE_DATA_DIR", "/tmp/fave-test");
        config.apply_env_overrides().unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/fave-test"));
    }

    #[test]
    fn test_env_override_backend() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("FAVE_BACKEND", "SQLite");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.backend, Backend::Sqlite);

        env::set_var("FAVE_BACKEND", "mongo");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_env_override_user_and_areas() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("FAVE_USER", "alice");
        env::set_var("FAVE_AREAS_FILE", "/etc/fave/areas.toml");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.default_user.as_deref(), Some("alice"));
        assert_eq!(config.areas_path(), PathBuf::from("/etc/fave/areas.toml"));

        // Empty string clears it
        env::set_var("FAVE_USER", "");
        env::set_var("FAVE_AREAS_FILE", "");
        config.apply_env_overrides().unwrap();
        assert!(config.default_user.is_none());
        assert!(config.areas_file.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/fave"),
            backend: Backend::Sqlite,
            areas_file: Some(PathBuf::from("/data/areas.toml")),
            default_user: Some("u1".to_string()),
            log_file: None,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("backend = \"sqlite\""));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.backend, config.backend);
        assert_eq!(parsed.areas_file, config.areas_file);
        assert_eq!(parsed.default_user, config.default_user);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            backend = "sqlite"
            default_user = "bob"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.default_user.as_deref(), Some("bob"));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("FAVE_DATA_DIR", temp_dir.path().join("data"));

        let config = Config::load_from_path(&temp_dir.path().join("missing.toml")).unwrap();
        // Defaults when file doesn't exist, data dir created
        assert_eq!(config.backend, Backend::Json);
        assert!(config.data_dir.exists());
    }

    #[test]
    fn test_save_to_path_roundtrip() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let config = Config {
            data_dir: temp_dir.path().join("data"),
            default_user: Some("carol".to_string()),
            ..Config::default()
        };

        config.save_to_path(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.default_user.as_deref(), Some("carol"));
        assert_eq!(loaded.data_dir, config.data_dir);
    }
}
