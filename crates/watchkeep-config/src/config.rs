use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables for the cache engine: projection page size, per-class TTLs for
/// the persistent tier, and the identity key that scopes persisted entries.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_progress_ttl")]
    pub progress_ttl_seconds: i64,

    #[serde(default = "default_history_ttl")]
    pub history_ttl_seconds: i64,

    #[serde(default = "default_watchlist_ttl")]
    pub watchlist_ttl_seconds: i64,

    /// Scopes persisted envelopes per authenticated identity. Empty means
    /// "fill in from the authenticated session at startup".
    #[serde(default)]
    pub owner_key: String,
}

fn default_page_size() -> usize {
    24
}

fn default_progress_ttl() -> i64 {
    6 * 3600
}

fn default_history_ttl() -> i64 {
    12 * 3600
}

fn default_watchlist_ttl() -> i64 {
    6 * 3600
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            progress_ttl_seconds: default_progress_ttl(),
            history_ttl_seconds: default_history_ttl(),
            watchlist_ttl_seconds: default_watchlist_ttl(),
            owner_key: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, falling back to defaults otherwise.
    pub fn load_or_default(path: &PathBuf) -> Self {
        if path.exists() {
            Self::load_from_file(path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.page_size == 0 {
            return Err(anyhow::anyhow!("cache.page_size must be at least 1"));
        }
        if self.cache.progress_ttl_seconds < 0
            || self.cache.history_ttl_seconds < 0
            || self.cache.watchlist_ttl_seconds < 0
        {
            return Err(anyhow::anyhow!("cache TTLs must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.page_size, 24);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.cache.page_size = 12;
        config.cache.owner_key = "user-abc".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.cache.page_size, 12);
        assert_eq!(loaded.cache.owner_key, "user-abc");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let config = Config::load_or_default(&path);
        assert_eq!(config.cache.page_size, 24);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = Config::default();
        config.cache.page_size = 0;
        assert!(config.validate().is_err());
    }
}
