//! Error types for the configuration module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while building, loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config validation error: {field} {requirement}")]
    Validation {
        field: String,
        requirement: &'static str,
    },

    #[error("Terraform workspace and organisation are required")]
    MissingTerraformCoordinates,

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn validation(field: impl Into<String>, requirement: &'static str) -> Self {
        Self::Validation {
            field: field.into(),
            requirement,
        }
    }

    /// Name of the offending field, if this is a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
