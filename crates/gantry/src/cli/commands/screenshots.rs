//! Screenshots command - Replace the screenshot sets of a localization

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use gantry_stores::apple::{discover_local_sets, plan_screenshot_sets};

use super::{print_json, Context};
use crate::cli::{output, Cli, OutputFormat};

/// Screenshot set management
#[derive(Debug, Args)]
pub struct ScreenshotsCommand {
    #[command(subcommand)]
    pub subcommand: ScreenshotsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ScreenshotsSubcommand {
    /// Upload local screenshot sets, replacing what the remote holds
    Push(PushArgs),

    /// Show what a push would change without changing anything
    Plan(PushArgs),
}

/// Push arguments
#[derive(Debug, Args)]
pub struct PushArgs {
    /// App store version localization id
    #[arg(long)]
    pub localization: String,

    /// Directory with one sub-directory per display type (defaults to screenshots.directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl PushArgs {
    fn directory(&self, ctx: &Context) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| ctx.config.screenshots.directory.clone())
    }
}

impl ScreenshotsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.subcommand {
            ScreenshotsSubcommand::Push(args) => push(args, cli).await,
            ScreenshotsSubcommand::Plan(args) => plan(args, cli).await,
        }
    }
}

async fn push(args: &PushArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let dir = args.directory(&ctx);

    if cli.is_text() {
        output::info(&format!(
            "Pushing screenshots from {} to localization {}",
            style(dir.display()).cyan(),
            style(&args.localization).cyan()
        ));
    }

    let spinner = output::spinner("Processing screenshot sets", cli.is_text());
    let result = ctx
        .connect
        .screenshot_executor()?
        .push(&args.localization, &dir)
        .await;
    spinner.finish_and_clear();
    let outcomes = result?;

    if cli.format == OutputFormat::Json {
        return print_json(&outcomes);
    }
    if cli.quiet {
        return Ok(());
    }

    if outcomes.is_empty() {
        output::warning("No screenshot sets found");
        return Ok(());
    }

    for outcome in &outcomes {
        let action = if outcome.set_created { "created" } else { "updated" };
        output::success(&format!(
            "{} ({}): {} uploaded, {} removed",
            style(&outcome.display_type).bold(),
            action,
            outcome.uploaded.len(),
            outcome.deleted
        ));
    }
    Ok(())
}

async fn plan(args: &PushArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let dir = args.directory(&ctx);

    let local = discover_local_sets(&dir).await?;
    let remote = ctx
        .connect
        .screenshot_executor()?
        .remote_sets(&args.localization)
        .await?;
    let plans = plan_screenshot_sets(&local, &remote);

    if cli.format == OutputFormat::Json {
        return print_json(&plans);
    }
    if cli.quiet {
        return Ok(());
    }

    for plan in &plans {
        let set = match &plan.existing_set_id {
            Some(id) => format!("set {}", id),
            None => "new set".to_string(),
        };
        println!("{} ({})", style(&plan.display_type).bold(), set);
        println!("{}", output::key_value("Delete", &plan.delete_ids.len().to_string()));
        for file in &plan.upload_files {
            println!("{}", output::key_value("Upload", &file.display().to_string()));
        }
    }
    Ok(())
}
