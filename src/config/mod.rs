//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog endpoints
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Search session tuning
    #[serde(default)]
    pub search: SearchConfig,

    /// Persistence settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Catalog endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the Open Library API
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

/// Search session tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Pause after the last keystroke before a request is issued
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Queries shorter than this (trimmed) never hit the network
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Bound on one search round trip, layered above the transport timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SearchConfig {
    /// Debounce window as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Round-trip bound as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_len: default_min_query_len(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_api_base() -> String {
    "https://openlibrary.org".to_string()
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_min_query_len() -> usize {
    3
}

fn default_request_timeout_ms() -> u64 {
    8000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./bookpitch.db")
}

/// Load configuration from a file, with `BOOKPITCH_`-prefixed environment
/// variables layered on top
pub fn load_config(path: &PathBuf) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(config::Environment::with_prefix("BOOKPITCH").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Look for a config file in the conventional locations:
/// `$BOOKPITCH_CONFIG`, `./bookpitch.toml`, then the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("BOOKPITCH_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from("bookpitch.toml");
    if local.exists() {
        return Some(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let path = dir.join("bookpitch").join("config.toml");
        if path.exists() {
            return Some(path);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.debounce_ms, 300);
        assert_eq!(config.search.min_query_len, 3);
        assert_eq!(config.search.request_timeout_ms, 8000);
        assert_eq!(config.catalog.api_base, "https://openlibrary.org");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [search]
            debounce_ms = 150
            "#,
        )
        .unwrap();

        assert_eq!(parsed.search.debounce_ms, 150);
        assert_eq!(parsed.search.min_query_len, 3);
        assert_eq!(parsed.store.db_path, PathBuf::from("./bookpitch.db"));
    }
}
