//! Builds command - Upload binaries and wait for the new build to process

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;
use tracing::info;

use gantry_stores::apple::TransporterUpload;
use gantry_stores::{BuildWaiter, DraftBuild};

use super::{print_json, Context};
use crate::cli::{output, Cli, OutputFormat};

/// Build management
#[derive(Debug, Args)]
pub struct BuildsCommand {
    #[command(subcommand)]
    pub subcommand: BuildsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum BuildsSubcommand {
    /// Show the most recently uploaded build
    Latest,

    /// Wait for a build newer than the given one to become valid
    Wait(WaitArgs),

    /// Upload a binary and wait until its build is valid
    Publish(PublishArgs),
}

/// Wait arguments
#[derive(Debug, Args)]
pub struct WaitArgs {
    /// Id of the latest build before the upload
    #[arg(long)]
    pub after: Option<String>,
}

/// Publish arguments
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Path to the .ipa or .pkg to upload
    pub artifact: PathBuf,

    /// Upload only, without waiting for processing
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, Serialize)]
struct LatestBuild {
    build_id: Option<String>,
}

impl BuildsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.subcommand {
            BuildsSubcommand::Latest => latest(cli).await,
            BuildsSubcommand::Wait(args) => wait(args, cli).await,
            BuildsSubcommand::Publish(args) => publish(args, cli).await,
        }
    }
}

async fn latest(cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let app_id = ctx.app_id(cli)?;
    let build_id = ctx.connect.build_poller().latest_build_id(&app_id).await?;

    if cli.format == OutputFormat::Json {
        return print_json(&LatestBuild { build_id });
    }
    if !cli.quiet {
        match build_id {
            Some(id) => println!("{}", output::key_value("Latest build", &id)),
            None => output::warning("No builds uploaded yet"),
        }
    }
    Ok(())
}

async fn wait(args: &WaitArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let app_id = ctx.app_id(cli)?;
    let build = wait_for_build(&ctx, cli, &app_id, args.after.as_deref()).await?;
    print_build(cli, &build)
}

async fn publish(args: &PublishArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let app_id = ctx.app_id(cli)?;
    let keys_dir = ctx.api_key.private_keys_dir()?;
    let poller = ctx.connect.build_poller();

    // Captured before the upload so the old head is never mistaken for the new build
    let latest_before = poller.latest_build_id(&app_id).await?;
    info!(latest_before = ?latest_before, "captured latest build");

    let upload = TransporterUpload::new(&ctx.credentials, ctx.config.app.platform)
        .with_private_keys_dir(keys_dir);

    let spinner = output::spinner(
        &format!("Uploading {}", style(args.artifact.display()).cyan()),
        cli.is_text(),
    );
    let result = upload.upload(&args.artifact).await;
    spinner.finish_and_clear();
    result?;

    if cli.is_text() {
        output::success("Upload complete");
    }
    if args.no_wait {
        return Ok(());
    }

    let build = wait_for_build(&ctx, cli, &app_id, latest_before.as_deref()).await?;
    print_build(cli, &build)
}

async fn wait_for_build(
    ctx: &Context,
    cli: &Cli,
    app_id: &str,
    latest_before: Option<&str>,
) -> anyhow::Result<DraftBuild> {
    let spinner = output::spinner("Waiting for build processing", cli.is_text());
    let result = ctx
        .connect
        .build_poller()
        .wait_for_new_build(app_id, latest_before)
        .await;
    spinner.finish_and_clear();
    Ok(result?)
}

fn print_build(cli: &Cli, build: &DraftBuild) -> anyhow::Result<()> {
    if cli.format == OutputFormat::Json {
        return print_json(build);
    }
    if !cli.quiet {
        output::success(&format!("Build {} is ready", style(&build.version).bold()));
        println!("{}", output::key_value("Build", &build.id));
        println!(
            "{}",
            output::key_value("State", &build.processing_state.to_string())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_wait_after_is_optional() {
        let cli = Cli::try_parse_from(["gantry", "builds", "wait"]).unwrap();
        let crate::cli::Commands::Builds(cmd) = cli.command else {
            panic!("expected builds command");
        };
        assert!(matches!(cmd.subcommand, BuildsSubcommand::Wait(WaitArgs { after: None })));
    }

    #[test]
    fn test_latest_build_json_shape() {
        let json = serde_json::to_value(LatestBuild { build_id: None }).unwrap();
        assert_eq!(json, serde_json::json!({"build_id": null}));
    }
}
