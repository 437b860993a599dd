//! Configuration management for Galgo.
//!
//! Configuration is loaded from the platform config directory
//! (`~/.config/galgo/config.toml` on Linux) with sensible defaults.
//! The loaded value is passed explicitly to the pipeline constructors.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Galgo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// On-disk layout
    pub storage: StorageConfig,

    /// Upload streaming and batching
    pub ingest: IngestConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Content identity settings
    pub hash: HashConfig,

    /// Thumbnail generation settings
    pub thumbnail: ThumbnailConfig,

    /// ffprobe / ffmpeg locations
    pub video: VideoConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.galgo.galgo/config.toml
    /// - Linux: ~/.config/galgo/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\galgo\config\config.toml
    ///
    /// Falls back to ~/.galgo/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "galgo", "galgo")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".galgo").join("config.toml")
            })
    }

    /// Get the resolved storage base directory (with ~ expansion).
    pub fn base_dir(&self) -> PathBuf {
        let path_str = self.storage.base_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.parallel_workers, 4);
        assert_eq!(config.storage.staging_dir, "tmp");
        assert_eq!(config.thumbnail.width, 256);
        assert_eq!(config.hash.video_strategy, VideoHashStrategy::Content);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[storage]"));
        assert!(toml.contains("[thumbnail]"));
        assert!(toml.contains("video_strategy = \"content\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [storage]
            base_dir = "/srv/galgo"

            [hash]
            video_strategy = "name_timestamp"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_dir(), PathBuf::from("/srv/galgo"));
        assert_eq!(config.storage.medias_dir, "medias");
        assert_eq!(config.hash.video_strategy, VideoHashStrategy::NameTimestamp);
        assert_eq!(config.thumbnail.height, 256);
    }

    #[test]
    fn test_base_dir_expands_tilde() {
        let config = Config::default();
        assert!(!config.base_dir().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_thumbnail_extension_follows_format() {
        let mut thumbnail = ThumbnailConfig::default();
        assert_eq!(thumbnail.extension(), "webp");
        thumbnail.format = "JPEG".to_string();
        assert_eq!(thumbnail.extension(), "jpg");
        thumbnail.format = "png".to_string();
        assert_eq!(thumbnail.extension(), "png");
    }
}
