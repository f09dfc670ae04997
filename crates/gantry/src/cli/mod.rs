//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{AssetsCommand, BuildsCommand, ReviewCommand, ScreenshotsCommand};

/// Gantry - Publish assets, builds and review submissions to App Store Connect
#[derive(Debug, Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// App Store Connect app id (overrides app.app_id)
    #[arg(long, global = true, env = "GANTRY_APP_ID")]
    pub app_id: Option<String>,

    /// App Store Connect API Key ID
    #[arg(long, global = true, env = "APP_STORE_CONNECT_API_KEY_ID")]
    pub api_key_id: Option<String>,

    /// App Store Connect Issuer ID
    #[arg(long, global = true, env = "APP_STORE_CONNECT_ISSUER_ID")]
    pub issuer_id: Option<String>,

    /// Path to API key (.p8 file)
    #[arg(long, global = true, env = "APP_STORE_CONNECT_API_KEY_PATH")]
    pub api_key: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a single asset
    Assets(AssetsCommand),

    /// Replace screenshot sets of a localization
    Screenshots(ScreenshotsCommand),

    /// Inspect, upload and wait for builds
    Builds(BuildsCommand),

    /// Submit or cancel App Review submissions
    Review(ReviewCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Assets(ref cmd) => cmd.execute(&self),
            Commands::Screenshots(ref cmd) => cmd.execute(&self),
            Commands::Builds(ref cmd) => cmd.execute(&self),
            Commands::Review(ref cmd) => cmd.execute(&self),
        }
    }

    /// Whether human-readable progress should be printed
    pub fn is_text(&self) -> bool {
        self.format == OutputFormat::Text && !self.quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gantry",
            "review",
            "submit",
            "--version-id",
            "v-1",
            "--app-id",
            "6450000000",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.app_id.as_deref(), Some("6450000000"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.is_text());
        assert!(matches!(cli.command, Commands::Review(_)));
    }
}
