use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SeiriError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub library: LibraryConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub hydrator: HydratorConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub watch_folders: Vec<PathBuf>,
    pub min_file_size_mb: u64,
    pub video_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Search the catalog for titles missing from the user's list.
    pub enhanced: bool,
    pub max_queries: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            enhanced: false,
            max_queries: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 90,
            burst: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub workers: usize,
    pub request_timeout_secs: u64,
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            request_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratorConfig {
    pub workers: usize,
}

impl Default for HydratorConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub anilist_token: Option<String>,
    pub anilist_username: Option<String>,
}

impl AppConfig {
    /// Load config: the user file if it exists, otherwise built-in defaults.
    pub fn load() -> Result<Self, SeiriError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            Self::parse(DEFAULT_CONFIG)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SeiriError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SeiriError::Config(e.to_string()))?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, SeiriError> {
        toml::from_str(content).map_err(|e| SeiriError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), SeiriError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SeiriError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SeiriError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the database file.
    pub fn db_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("seiri.db"))
            .unwrap_or_else(|| PathBuf::from("seiri.db"))
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, SeiriError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "seiri")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert!(config.library.watch_folders.is_empty());
        assert!(config.library.video_extensions.iter().any(|e| e == "mkv"));
        assert!(!config.matching.enhanced);
        assert_eq!(config.limiter.requests_per_minute, 90);
        assert_eq!(config.limiter.burst, 1);
        assert_eq!(config.fetcher.workers, 4);
        assert_eq!(config.fetcher.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.hydrator.workers, 4);
        assert!(config.services.anilist_token.is_none());
    }

    #[test]
    fn test_missing_sections_fall_back() {
        let config = AppConfig::parse(
            r#"
            [library]
            watch_folders = ["/anime"]
            min_file_size_mb = 0
            video_extensions = ["mkv"]
            "#,
        )
        .unwrap();
        assert_eq!(config.library.watch_folders, vec![PathBuf::from("/anime")]);
        assert_eq!(config.limiter.requests_per_minute, 90);
        assert_eq!(config.matching.max_queries, 50);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::parse("library = 3").unwrap_err();
        assert!(matches!(err, SeiriError::Config(_)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.matching.enhanced = true;
        config.services.anilist_username = Some("someone".into());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!(loaded.matching.enhanced);
        assert_eq!(loaded.services.anilist_username.as_deref(), Some("someone"));
    }
}
