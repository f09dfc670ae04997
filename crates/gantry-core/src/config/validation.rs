//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_app(config)?;
    validate_api(config)?;
    validate_polling(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_app(config: &Config) -> Result<()> {
    let ids = [
        ("app.app_id", &config.app.app_id),
        ("app.version_id", &config.app.version_id),
    ];
    for (field, value) in ids {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "cannot be empty".to_string(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_api(config: &Config) -> Result<()> {
    let base_url = &config.api.base_url;
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        return Err(ConfigError::InvalidValue {
            field: "api.base_url".to_string(),
            message: "must be an http(s) URL".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_polling(config: &Config) -> Result<()> {
    let polling = &config.polling;
    let nonzero = [
        ("polling.asset_poll_max_attempts", u64::from(polling.asset_poll_max_attempts)),
        ("polling.build_poll_timeout_secs", polling.build_poll_timeout_secs),
        ("polling.build_list_limit", u64::from(polling.build_list_limit)),
        ("polling.submission_page_limit", u64::from(polling.submission_page_limit)),
    ];

    for (field, value) in nonzero {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GantryError;

    fn invalid_field(config: &Config) -> String {
        match validate_config(config) {
            Err(GantryError::Config(ConfigError::InvalidValue { field, .. })) => field,
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_delays_are_allowed() {
        let mut config = Config::default();
        config.polling = gantry_stores::PollingConfig::immediate();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.polling.asset_poll_max_attempts = 0;
        assert_eq!(invalid_field(&config), "polling.asset_poll_max_attempts");
    }

    #[test]
    fn test_validate_zero_page_limit() {
        let mut config = Config::default();
        config.polling.submission_page_limit = 0;
        assert_eq!(invalid_field(&config), "polling.submission_page_limit");
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = Config::default();
        config.api.base_url = "ftp://example.com".to_string();
        assert_eq!(invalid_field(&config), "api.base_url");
    }

    #[test]
    fn test_validate_empty_app_id() {
        let mut config = Config::default();
        config.app.app_id = Some("  ".to_string());
        assert_eq!(invalid_field(&config), "app.app_id");
    }
}
