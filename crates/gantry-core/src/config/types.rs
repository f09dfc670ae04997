//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use gantry_stores::{Platform, PollingConfig, DEFAULT_API_BASE_URL};

use crate::error::{ConfigError, Result};

/// Main configuration for Gantry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project name
    pub name: Option<String>,

    /// App being published
    pub app: AppConfig,

    /// App Store Connect API access
    pub api: ApiConfig,

    /// Poll intervals, attempt caps and delays
    pub polling: PollingConfig,

    /// Screenshot sources
    pub screenshots: ScreenshotsConfig,
}

/// App configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// App Store Connect app id
    pub app_id: Option<String>,

    /// Draft app store version to submit
    pub version_id: Option<String>,

    /// Platform of the app version
    pub platform: Platform,
}

/// App Store Connect API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL
    pub base_url: String,

    /// API key id
    pub key_id: Option<String>,

    /// API key issuer id
    pub issuer_id: Option<String>,

    /// Path to the `.p8` private key
    pub key_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            key_id: None,
            issuer_id: None,
            key_path: None,
        }
    }
}

impl ApiConfig {
    /// Resolve the API key, preferring the given values over the configured ones
    pub fn resolve_api_key(
        &self,
        key_id: Option<String>,
        issuer_id: Option<String>,
        key_path: Option<PathBuf>,
    ) -> Result<ApiKey> {
        let key_id = key_id
            .or_else(|| self.key_id.clone())
            .ok_or_else(|| ConfigError::MissingField("api.key_id".to_string()))?;
        let issuer_id = issuer_id
            .or_else(|| self.issuer_id.clone())
            .ok_or_else(|| ConfigError::MissingField("api.issuer_id".to_string()))?;
        let key_path = key_path
            .or_else(|| self.key_path.clone())
            .ok_or_else(|| ConfigError::MissingField("api.key_path".to_string()))?;

        Ok(ApiKey {
            key_id,
            issuer_id,
            key_path,
        })
    }
}

/// A resolved App Store Connect API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key_id: String,
    pub issuer_id: String,

    /// Path to the `.p8` private key
    pub key_path: PathBuf,
}

impl ApiKey {
    /// Directory to hand the upload tool as `API_PRIVATE_KEYS_DIR`
    ///
    /// The tool only finds the key when the file is named `AuthKey_<key id>.p8`.
    pub fn private_keys_dir(&self) -> Result<&Path> {
        let expected = format!("AuthKey_{}.p8", self.key_id);
        let file_name = self.key_path.file_name().and_then(|n| n.to_str());
        if file_name != Some(expected.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "api.key_path".to_string(),
                message: format!(
                    "the upload tool needs the key file named {}, found {}",
                    expected,
                    self.key_path.display()
                ),
            }
            .into());
        }

        Ok(self
            .key_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new(".")))
    }
}

/// Screenshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotsConfig {
    /// Directory holding one sub-directory per display type
    pub directory: PathBuf,
}

impl Default for ScreenshotsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("screenshots"),
        }
    }
}
