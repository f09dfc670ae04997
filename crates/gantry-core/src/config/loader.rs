//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::Config;
use super::validation::validate_config;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            other => Err(ConfigError::ParseError(format!(
                "unsupported config file extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))
            .into()),
        }
    }
}

/// Parse configuration text without validating it
fn parse_config(content: &str, format: Format) -> Result<Config> {
    let config = match format {
        Format::Toml => toml::from_str(content).map_err(ConfigError::TomlError)?,
        Format::Yaml => serde_yaml::from_str(content).map_err(ConfigError::YamlError)?,
    };
    Ok(config)
}

/// Load and validate configuration from a file
pub fn load_config(path: &Path) -> Result<Config> {
    let format = Format::of(path)?;
    info!(path = %path.display(), format = ?format, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content, format)?;

    validate_config(&config)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(config)
}

/// Find configuration file in directory or parent directories.
///
/// At each directory level the search checks:
///   1. `<dir>/<name>`          (e.g. `gantry.yaml`)
///   2. `<dir>/.github/<name>`  (e.g. `.github/gantry.yaml`)
///
/// The first match wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");

    for dir in start_dir.ancestors() {
        for name in config_file_names() {
            let candidates = [dir.join(name), dir.join(".github").join(name)];
            if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
                info!(path = %found.display(), "found config file");
                return Some(found);
            }
        }
    }

    debug!("no config file found");
    None
}

/// Load configuration from directory (searching parent directories)
pub fn load_config_from_dir(dir: &Path) -> Result<(Config, PathBuf)> {
    let config_path = find_config(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

    let config = load_config(&config_path)?;
    Ok((config, config_path))
}

/// Load configuration, falling back to defaults only when no file exists
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_config_or_default(dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    match find_config(dir) {
        Some(path) => {
            let config = load_config(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            warn!(dir = %dir.display(), "no config found, using defaults");
            Ok((Config::default(), None))
        }
    }
}
