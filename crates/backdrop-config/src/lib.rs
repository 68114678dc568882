//! Backdrop configuration and preference storage
//!
//! Handles loading the application config from ~/.backdrop/config.toml and
//! the persisted appearance preferences kept next to it.

pub mod keys;
pub mod preferences;
pub mod store;
pub mod watcher;

pub use keys::{NumericRange, PrefKey};
pub use preferences::{PartialSaveError, PreferenceDefaults, Preferences};
pub use store::{FileStore, MemoryStore, PreferenceStore, StoreError};
pub use watcher::{PreferenceEvent, PreferenceWatcher, PreferenceWatcherBuilder};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration directory name
const CONFIG_DIR_NAME: &str = ".backdrop";
/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable that overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "BACKDROP_CONFIG_DIR";

/// General configuration section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    /// System appearance, used until the user picks a theme
    #[serde(default)]
    pub prefers_dark: bool,
}

/// Bundled background images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Image applied by "restore default background"
    #[serde(default = "default_background_image")]
    pub default_image: String,

    /// Rotation set used before the user uploads any carousel image
    #[serde(default = "default_carousel")]
    pub default_carousel: Vec<String>,
}

fn default_background_image() -> String {
    "./Default1.avif".to_string()
}

fn default_carousel() -> Vec<String> {
    (1..=5).map(|i| format!("./Default{i}.avif")).collect()
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            default_image: default_background_image(),
            default_carousel: default_carousel(),
        }
    }
}

/// Particle overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParticlesConfig {
    /// Fixed PRNG seed; a time-derived seed is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Preference storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File name of the preference store inside the config directory
    #[serde(default = "default_preferences_file")]
    pub preferences_file: String,
}

fn default_preferences_file() -> String {
    "preferences.toml".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            preferences_file: default_preferences_file(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub background: BackgroundConfig,

    #[serde(default)]
    pub particles: ParticlesConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the config directory, creating a default file
    /// if none exists
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = Self::config_dir()?;
        Self::load_or_create_in(&config_dir)
    }

    /// Load `config.toml` from `dir`, creating it with defaults if missing
    pub fn load_or_create_in(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::info!("Config file not found, creating default at {:?}", config_path);
            Self::create_default_config(dir)?;
        }

        let config = Self::load_from(&config_path)?;
        log::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Configuration directory: `$BACKDROP_CONFIG_DIR` or `~/.backdrop/`
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(home.join(CONFIG_DIR_NAME))
    }

    /// Write the default configuration file into `dir`
    pub fn create_default_config(dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;

        let toml_content = toml::to_string_pretty(&Config::default())?;
        let content = format!(
            "# Backdrop configuration\n\
             #\n\
             # Appearance choices made in the application are stored separately\n\
             # in the preferences file named under [storage].\n\
             \n\
             {toml_content}"
        );

        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).map_err(|e| ConfigError::Write(config_path.clone(), e))?;

        log::info!("Created default configuration at {:?}", config_path);
        Ok(())
    }

    /// Path of the preferences file inside `dir`
    pub fn preferences_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.storage.preferences_file)
    }

    /// Defaults handed to [`Preferences`]
    pub fn preference_defaults(&self) -> PreferenceDefaults {
        PreferenceDefaults {
            prefers_dark: self.general.prefers_dark,
            carousel_images: self.background.default_carousel.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Failed to read {0:?}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse {0:?}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write {0:?}: {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to create {0:?}: {1}")]
    CreateDir(PathBuf, #[source] std::io::Error),
}
