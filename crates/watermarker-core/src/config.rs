//! Application configuration
//!
//! Settings come from `config.toml` in the user's config directory,
//! overridden by `WATERMARKER_<SECTION>__<KEY>` environment variables.
//! Watermark profiles are not part of this file; they live in the
//! [`ProfileStore`](crate::store::ProfileStore).

use crate::batch::DEFAULT_QUALITY;
use crate::error::{Result, WatermarkError};
use crate::fonts::FontResolver;
use crate::store::ProfileStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const ENV_PREFIX: &str = "WATERMARKER";
const CONFIG_DIR_NAME: &str = "watermarker";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub batch: BatchConfig,
    pub fonts: FontConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Batch-run behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Encoder quality for lossy formats, 1-100
    pub quality: u8,
    pub on_save_error: OnSaveError,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            on_save_error: OnSaveError::Ask,
        }
    }
}

/// What to do when an output file cannot be written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnSaveError {
    #[default]
    Ask,
    Continue,
    Abort,
}

impl OnSaveError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnSaveError::Ask => "ask",
            OnSaveError::Continue => "continue",
            OnSaveError::Abort => "abort",
        }
    }
}

impl fmt::Display for OnSaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnSaveError {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(OnSaveError::Ask),
            "continue" => Ok(OnSaveError::Continue),
            "abort" => Ok(OnSaveError::Abort),
            other => Err(WatermarkError::InvalidInput {
                message: format!("Unknown save error policy '{}'", other),
            }),
        }
    }
}

/// Font search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub directories: Vec<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            directories: FontResolver::default_directories(),
        }
    }
}

/// Where profiles and session state are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit store file; when unset it is derived from the names below
    pub profile_store: Option<PathBuf>,
    pub organization: String,
    pub application: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile_store: None,
            organization: "watermarker".to_string(),
            application: "profiles".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Also write logs to this file
    pub output_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output_path: None,
        }
    }
}

impl AppConfig {
    /// Path of the profile store this configuration points at
    pub fn profile_store_path(&self) -> Result<PathBuf> {
        match &self.storage.profile_store {
            Some(path) => Ok(path.clone()),
            None => ProfileStore::default_path(&self.storage.organization, &self.storage.application),
        }
    }

    pub fn font_resolver(&self) -> FontResolver {
        FontResolver::new(self.fonts.directories.clone())
    }

    /// Render as the TOML written to the config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WatermarkError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Load from the default location
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_config_path()?)
    }

    /// Load from a custom path; a missing file yields the defaults
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = Self::load(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Replace the configuration and persist it
    pub fn update_config(&mut self, config: AppConfig) -> Result<()> {
        validate(&config)?;
        self.config = config;
        self.save()
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WatermarkError::ConfigError {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let config_str = self.config.to_toml()?;

        std::fs::write(&self.config_path, config_str).map_err(|e| {
            WatermarkError::ConfigError {
                message: format!("Failed to write config file: {}", e),
            }
        })?;

        tracing::info!("Configuration saved to {:?}", self.config_path);
        Ok(())
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WatermarkError::ConfigError {
                message: "Could not determine config directory".to_string(),
            })?
            .join(CONFIG_DIR_NAME);

        Ok(config_dir.join("config.toml"))
    }

    fn load(path: &Path) -> Result<AppConfig> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| WatermarkError::ConfigError {
                message: format!("Failed to read config file: {}", e),
            })?;

        let config: AppConfig =
            settings
                .try_deserialize()
                .map_err(|e| WatermarkError::ConfigError {
                    message: format!("Failed to parse config file: {}", e),
                })?;

        validate(&config)?;

        if path.exists() {
            tracing::debug!("Configuration loaded from {:?}", path);
        } else {
            tracing::debug!("Using default configuration");
        }
        Ok(config)
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    crate::utils::validation::validate_quality(config.batch.quality).map_err(|e| {
        WatermarkError::ConfigError {
            message: e.to_string(),
        }
    })
}
