use std::path::{Path, PathBuf};
use serde::Deserialize;
use anyhow::{Context, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/upnp-bookmarks/bookmarks.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Bookmarks not re-saved for this long are removed by `prune`
    #[serde(default = "default_prune_after")]
    pub prune_after_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/upnp-bookmarks/bookmarks.db")
}

fn default_prune_after() -> u64 {
    30 * 24 * 3600
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            prune_after_secs: default_prune_after(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    /// Used for the default path only; an explicit path must exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
