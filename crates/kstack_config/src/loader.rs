//! Reading configuration documents from disk.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::models::Config;
use crate::validator::ConfigValidator;

/// Supported configuration document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Loader for configuration documents.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, validate and deserialize a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Config> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

        info!("Loading config from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_str(&content, format)
    }

    /// Validate and deserialize a configuration document.
    pub fn from_str(content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let doc: Value = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        debug!("Parsed {:?} config document", format);

        ConfigValidator::validate_document(&doc)?;
        let config: Config = serde_json::from_value(doc)?;
        ConfigValidator::validate(&config)?;

        Ok(config)
    }
}
