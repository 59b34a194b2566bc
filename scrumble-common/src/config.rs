//! Configuration loading and data folder resolution
//!
//! The client reads one optional TOML file. A missing file is not an error:
//! the client logs a warning and runs on compiled defaults.
//!
//! Data folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::overrides::OverrideLayers;
use crate::{Error, Result};

/// Environment variable naming the client data folder
pub const DATA_FOLDER_ENV: &str = "SCRUMBLE_DATA_FOLDER";
/// Environment variable naming the client config file
pub const CONFIG_FILE_ENV: &str = "SCRUMBLE_CONFIG";
/// Environment variable naming the API database file
pub const DATABASE_ENV: &str = "SCRUMBLE_DB";
/// Environment variable holding the API admin key
pub const ADMIN_KEY_ENV: &str = "SCRUMBLE_ADMIN_KEY";
/// Default API listen port
pub const DEFAULT_PORT: u16 = 5730;

/// API base the client uses when neither the command line nor the config names one
pub fn default_api_base() -> String {
    format!("http://127.0.0.1:{}", DEFAULT_PORT)
}

/// Client configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Base URL of the matchup API, e.g. `http://127.0.0.1:5730`
    pub api_base: Option<String>,

    /// Folder holding the per-browser storage file
    pub data_folder: Option<PathBuf>,

    pub logging: LoggingConfig,

    /// Placeholder vote counts; disabled when the table is absent
    pub seed_votes: SeedVotesConfig,

    pub retry: RetryConfig,

    /// Global override layers (`[overrides.by_index."0"]`, `[overrides.by_id.<id>]`)
    pub overrides: OverrideLayers,
}

impl TomlConfig {
    /// API base with any trailing slash removed, `None` when unset or blank
    pub fn api_url(&self) -> Option<String> {
        self.api_base
            .as_deref()
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// When seeded counts replace the real ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Always show seeded counts
    Override,
    /// Only show seeded counts while the real tally is exactly zero
    #[default]
    #[serde(alias = "ifZero")]
    IfZero,
}

/// Seeded placeholder vote configuration
///
/// Writing a `[seed_votes]` table enables seeding unless it says
/// `enabled = false`; leaving the table out keeps seeding off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedVotesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: SeedMode,
    #[serde(default = "default_seed_min")]
    pub min: u64,
    #[serde(default = "default_seed_max")]
    pub max: u64,
    #[serde(default = "default_seed_jitter")]
    pub jitter: u64,
}

impl Default for SeedVotesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SeedMode::IfZero,
            min: default_seed_min(),
            max: default_seed_max(),
            jitter: default_seed_jitter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_seed_min() -> u64 {
    20
}

fn default_seed_max() -> u64 {
    180
}

fn default_seed_jitter() -> u64 {
    6
}

/// Retry settings for calls to the matchup API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Upper bound on the whole operation, retries included
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4000,
            multiplier: 2.0,
            timeout_ms: 15_000,
        }
    }
}

/// API server configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerTomlConfig {
    /// SQLite database file
    pub database: Option<PathBuf>,
    pub port: Option<u16>,
    /// Admin key; the environment variable takes precedence
    pub admin_key: Option<String>,
    pub logging: LoggingConfig,
}

/// Load the API server config, or defaults when `path` is `None` or missing
pub fn load_server_config(path: Option<&Path>) -> Result<ServerTomlConfig> {
    match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
        }
        Some(path) => {
            warn!("No config file at {}, using defaults", path.display());
            Ok(ServerTomlConfig::default())
        }
        None => Ok(ServerTomlConfig::default()),
    }
}

/// Database path: CLI argument > `SCRUMBLE_DB` > TOML > platform default
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &ServerTomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATABASE_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.database {
        return path.clone();
    }

    default_data_folder().join("scrumble.db")
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate and load the client config, falling back to defaults
///
/// Priority: explicit path > `SCRUMBLE_CONFIG` > platform config folder.
/// An explicitly named file that cannot be read is an error; a missing
/// default file is not.
pub fn load_client_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = cli_path {
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return load_toml_config(Path::new(&path));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!("No config file at {}, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Platform config file path (`~/.config/scrumble/client.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scrumble").join("client.toml"))
}

/// Data folder resolution following the documented priority order
pub fn resolve_data_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.data_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("scrumble"))
        .unwrap_or_else(|| PathBuf::from("./scrumble_data"))
}
