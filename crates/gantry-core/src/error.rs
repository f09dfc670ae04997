//! Error types for Gantry

use std::path::PathBuf;
use thiserror::Error;

use gantry_stores::PublishError;

/// Result type alias using GantryError
pub type Result<T> = std::result::Result<T, GantryError>;

/// Main error type for Gantry operations
#[derive(Debug, Error)]
pub enum GantryError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pipeline errors
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err: GantryError = ConfigError::InvalidValue {
            field: "app.platform".to_string(),
            message: "must be one of: IOS".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: app.platform - must be one of: IOS"
        );

        let err: GantryError = ConfigError::MissingField("app.app_id".to_string()).into();
        assert!(err.to_string().contains("app.app_id"));
    }

    #[test]
    fn test_publish_error_is_transparent() {
        let err: GantryError = PublishError::Timeout("shot1.png".to_string()).into();
        assert_eq!(err.to_string(), "Operation timed out: shot1.png");
    }
}
