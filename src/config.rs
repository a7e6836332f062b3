//! Run configuration and persisted settings
//!
//! `Settings` stores user defaults in ~/.config/zipsift/settings.json.
//! `PipelineConfig` is what a single pipeline run actually uses.

use crate::walk::WalkOrder;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Extension matched when nothing else is configured
pub const DEFAULT_EXTENSION: &str = ".csv";

/// Size of the intermediate buffer used when copying entry contents
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Prefix for workspace directory names (leading dot hides it on Unix)
pub const DEFAULT_WORKSPACE_PREFIX: &str = ".zipsift-";

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Only entries with this extension (including the dot) are extracted
    pub extension: String,

    /// Directory under which workspaces are created
    pub temp_root: PathBuf,

    /// Copy buffer size in bytes
    pub buffer_size: usize,

    /// Traversal order for the processing stage
    pub walk_order: WalkOrder,

    /// Workspace directory name prefix
    pub workspace_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            temp_root: std::env::temp_dir(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            walk_order: WalkOrder::default(),
            workspace_prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Build a run configuration from persisted settings
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::default();
        if let Some(ref ext) = settings.default_extension {
            config.extension = ext.clone();
        }
        if let Some(ref root) = settings.temp_root {
            config.temp_root = root.clone();
        }
        if let Some(size) = settings.buffer_size {
            config.buffer_size = size;
        }
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.extension.starts_with('.') || self.extension.len() < 2 {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }

        if !self.temp_root.is_dir() {
            return Err(ConfigError::TempRootNotFound(self.temp_root.clone()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Extension must start with '.' and name a suffix, got '{0}'")]
    InvalidExtension(String),

    #[error("Copy buffer size must be greater than zero")]
    ZeroBufferSize,

    #[error("Temporary root directory not found: {0}")]
    TempRootNotFound(PathBuf),

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,
}

/// User settings for zipsift
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Extension to extract when --extension is not given
    #[serde(default)]
    pub default_extension: Option<String>,

    /// Where to create workspaces instead of the system temp dir
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Copy buffer size in bytes
    #[serde(default)]
    pub buffer_size: Option<usize>,

    /// Maximum archives processed at once
    #[serde(default)]
    pub concurrent: Option<usize>,
}

impl Settings {
    /// Get the config directory path (~/.config/zipsift)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("zipsift");

        Ok(config_dir)
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        let loaded = Self::settings_path().and_then(|path| Self::load_from(&path));
        match loaded {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    /// Check that every stored value would produce a usable run configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.concurrent == Some(0) {
            return Err(ConfigError::ZeroConcurrency);
        }
        PipelineConfig::from_settings(self).validate()
    }

    /// Load settings from a specific file; a missing file yields defaults
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save settings to a specific file, creating parent directories
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.extension, ".csv");
        assert_eq!(config.buffer_size, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_extension() {
        let mut config = PipelineConfig::default();
        config.extension = "csv".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExtension(_))
        ));

        config.extension = ".".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_buffer_and_missing_root() {
        let mut config = PipelineConfig::default();
        config.buffer_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBufferSize)));

        let mut config = PipelineConfig::default();
        config.temp_root = PathBuf::from("/definitely/not/a/real/dir");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TempRootNotFound(_))
        ));
    }

    #[test]
    fn test_settings_roundtrip_and_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        // Missing file yields defaults
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());

        let settings = Settings {
            default_extension: Some(".tsv".to_string()),
            temp_root: Some(dir.path().to_path_buf()),
            buffer_size: Some(8192),
            concurrent: Some(2),
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);

        let config = PipelineConfig::from_settings(&loaded);
        assert_eq!(config.extension, ".tsv");
        assert_eq!(config.temp_root, dir.path());
        assert_eq!(config.buffer_size, 8192);
    }

    #[test]
    fn test_settings_validate() {
        let dir = tempdir().unwrap();
        assert!(Settings::default().validate().is_ok());

        let settings = Settings {
            default_extension: Some(".tsv".to_string()),
            temp_root: Some(dir.path().to_path_buf()),
            buffer_size: Some(1024),
            concurrent: Some(3),
        };
        assert!(settings.validate().is_ok());

        let bad = Settings {
            concurrent: Some(0),
            ..settings.clone()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::ZeroConcurrency)));

        let bad = Settings {
            default_extension: Some("tsv".to_string()),
            ..settings.clone()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidExtension(_))));

        let bad = Settings {
            temp_root: Some(dir.path().join("missing")),
            ..settings
        };
        assert!(matches!(bad.validate(), Err(ConfigError::TempRootNotFound(_))));
    }

    #[test]
    fn test_settings_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"default_extension": ".json"}"#).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.default_extension.as_deref(), Some(".json"));
        assert!(loaded.temp_root.is_none());
    }

    #[test]
    fn test_settings_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }
}
