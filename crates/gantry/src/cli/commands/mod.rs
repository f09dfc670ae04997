//! CLI commands

mod assets;
mod builds;
mod review;
mod screenshots;

pub use assets::AssetsCommand;
pub use builds::BuildsCommand;
pub use review::ReviewCommand;
pub use screenshots::ScreenshotsCommand;

use anyhow::Context as _;
use tracing::debug;

use gantry_core::{load_config_or_default, ApiKey, Config, ConfigError};
use gantry_stores::apple::AppStoreConnect;
use gantry_stores::Credentials;

use crate::cli::Cli;

/// Everything a remote command needs: configuration, credentials and the pipeline
pub(crate) struct Context {
    pub config: Config,
    pub api_key: ApiKey,
    pub credentials: Credentials,
    pub connect: AppStoreConnect,
}

impl Context {
    pub async fn load(cli: &Cli) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let (config, config_path) = load_config_or_default(&cwd)?;
        if let Some(path) = &config_path {
            debug!(path = %path.display(), "using config");
        }

        let api_key = config.api.resolve_api_key(
            cli.api_key_id.clone(),
            cli.issuer_id.clone(),
            cli.api_key.clone(),
        )?;
        let credentials = Credentials::from_key_file(
            api_key.key_id.clone(),
            api_key.issuer_id.clone(),
            &api_key.key_path,
        )
        .await?;

        let connect = AppStoreConnect::with_base_url(
            credentials.clone(),
            &config.api.base_url,
            config.app.platform,
            config.polling.clone(),
        )
        .context("Failed to create App Store Connect client")?;

        Ok(Self {
            config,
            api_key,
            credentials,
            connect,
        })
    }

    /// App id from the command line, else from the config
    pub fn app_id(&self, cli: &Cli) -> Result<String, ConfigError> {
        resolve_app_id(cli.app_id.as_deref(), &self.config)
    }
}

fn resolve_app_id(flag: Option<&str>, config: &Config) -> Result<String, ConfigError> {
    flag.map(str::to_string)
        .or_else(|| config.app.app_id.clone())
        .ok_or_else(|| ConfigError::MissingField("app.app_id".to_string()))
}

/// Print a serializable result as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_app_id_prefers_flag() {
        let mut config = Config::default();
        config.app.app_id = Some("from-config".to_string());

        assert_eq!(resolve_app_id(Some("from-flag"), &config).unwrap(), "from-flag");
        assert_eq!(resolve_app_id(None, &config).unwrap(), "from-config");
    }

    #[test]
    fn test_resolve_app_id_missing() {
        let err = resolve_app_id(None, &Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "app.app_id"));
    }
}
