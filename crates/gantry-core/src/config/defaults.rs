//! Default configuration values

use super::types::Config;

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "gantry.yaml";

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "gantry.toml";

/// Alternative configuration file name
pub const ALT_CONFIG_FILE: &str = ".gantry.yaml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_YAML,
        DEFAULT_CONFIG_TOML,
        ALT_CONFIG_FILE,
        ".gantry.toml",
    ]
}

/// Generate default configuration YAML
pub fn default_config_yaml() -> String {
    let config = Config::default();
    serde_yaml::to_string(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Gantry Configuration

app:
  # app_id: "1234567890"
  platform: IOS

api:
  base_url: https://api.appstoreconnect.apple.com/v1

polling:
  asset_poll_interval_secs: 2
  asset_poll_max_attempts: 30
  build_poll_interval_secs: 30
  build_poll_timeout_secs: 1200
  build_list_limit: 5
  screenshot_settle_delay_secs: 3
  submission_page_limit: 20

screenshots:
  directory: screenshots
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        let defaults = Config::default();
        assert_eq!(config.polling, defaults.polling);
        assert_eq!(config.api.base_url, defaults.api.base_url);
        assert_eq!(config.screenshots.directory, defaults.screenshots.directory);
    }

    #[test]
    fn test_default_yaml_round_trips() {
        let yaml = default_config_yaml();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.app.platform, Config::default().app.platform);
    }
}
