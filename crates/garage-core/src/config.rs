//! Garage settings
//!
//! Settings are layered: built-in defaults, then `config.toml`, then
//! `GARAGE_*` environment variables. A missing file is not an error.
//!
//! ```toml
//! data_dir = "/home/me/.local/share/garage"
//! database_file = "garage.db"
//! state_history_limit = 10
//! parking_history_limit = 10
//! log_file = "/tmp/garage.log"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Capacity of each history log unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

const ENV_DATA_DIR: &str = "GARAGE_DATA_DIR";
const ENV_STATE_LIMIT: &str = "GARAGE_STATE_LIMIT";
const ENV_PARKING_LIMIT: &str = "GARAGE_PARKING_LIMIT";
const ENV_CONFIG: &str = "GARAGE_CONFIG";

/// Where the store lives and how much history it keeps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the database file
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`
    pub database_file: String,

    /// Saved states kept by `Store::append_saved_state`
    pub state_history_limit: usize,

    /// Parking entries kept by `Store::append_saved_parking`
    pub parking_history_limit: usize,

    /// Log destination; stderr when unset
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("garage");

        Self {
            data_dir,
            database_file: "garage.db".to_string(),
            state_history_limit: DEFAULT_HISTORY_LIMIT,
            parking_history_limit: DEFAULT_HISTORY_LIMIT,
            log_file: None,
        }
    }
}

impl Config {
    /// Read the default config file, then apply the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Like [`Config::load`], but `--config` wins over the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Read `path` (defaults if it does not exist), then apply the environment
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default().with_env());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let config: Config =
            toml::from_str(&text).with_context(|| format!("Invalid TOML in {}", path.display()))?;
        Ok(config.with_env())
    }

    /// Parse settings from TOML text, then apply the environment
    pub fn load_from_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).context("Invalid config TOML")?;
        Ok(config.with_env())
    }

    /// Overlay `GARAGE_*` variables. Limits that don't parse are ignored.
    fn with_env(mut self) -> Self {
        if let Some(dir) = std::env::var_os(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(limit) = env_limit(ENV_STATE_LIMIT) {
            self.state_history_limit = limit;
        }
        if let Some(limit) = env_limit(ENV_PARKING_LIMIT) {
            self.parking_history_limit = limit;
        }
        self
    }

    /// Write to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Write to `path`, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        let text = toml::to_string_pretty(self).context("Cannot encode config as TOML")?;
        std::fs::write(path, text).with_context(|| format!("Cannot write {}", path.display()))
    }

    /// `GARAGE_CONFIG`, or `config.toml` under the platform config dir
    pub fn config_file_path() -> PathBuf {
        match std::env::var_os(ENV_CONFIG) {
            Some(path) => PathBuf::from(path),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("garage")
                .join("config.toml"),
        }
    }

    /// Full path of the SQLite file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

fn env_limit(var: &str) -> Option<usize> {
    std::env::var(var).ok()?.trim().parse().ok()
}
