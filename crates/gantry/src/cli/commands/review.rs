//! Review command - Submit an app version for review or cancel submissions

use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;

use gantry_core::ConfigError;
use gantry_stores::{AttachOutcome, ReviewSubmitter, SubmissionReport};

use super::{print_json, Context};
use crate::cli::{output, Cli, OutputFormat};

/// App Review submissions
#[derive(Debug, Args)]
pub struct ReviewCommand {
    #[command(subcommand)]
    pub subcommand: ReviewSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ReviewSubcommand {
    /// Add a version to a review submission and submit it
    Submit(SubmitArgs),

    /// Cancel every active review submission of the app
    Cancel,
}

/// Submit arguments
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// App store version id (defaults to app.version_id)
    #[arg(long)]
    pub version_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CancelReport {
    canceled: Vec<String>,
}

impl ReviewCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.subcommand {
            ReviewSubcommand::Submit(args) => submit(args, cli).await,
            ReviewSubcommand::Cancel => cancel(cli).await,
        }
    }
}

async fn submit(args: &SubmitArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let app_id = ctx.app_id(cli)?;
    let version_id = args
        .version_id
        .clone()
        .or_else(|| ctx.config.app.version_id.clone())
        .ok_or_else(|| ConfigError::MissingField("app.version_id".to_string()))?;

    let report = ctx
        .connect
        .review_submitter()
        .submit(&app_id, &version_id)
        .await?;

    if cli.format == OutputFormat::Json {
        return print_json(&report);
    }
    if cli.quiet {
        return Ok(());
    }

    let attach = match report.attach {
        AttachOutcome::Created => "attached",
        AttachOutcome::AlreadyAttached => "already attached by another client",
        AttachOutcome::AlreadyMember => "already in the submission",
    };
    if report.submitted {
        output::success(&summary(&version_id, &report));
    } else {
        output::info(&summary(&version_id, &report));
    }
    println!("{}", output::key_value("Submission", &report.container_id));
    println!(
        "{}",
        output::key_value("Created", if report.container_created { "yes" } else { "no" })
    );
    println!("{}", output::key_value("Version", attach));
    Ok(())
}

fn summary(version_id: &str, report: &SubmissionReport) -> String {
    if report.submitted {
        format!("Version {} submitted for review", style(version_id).bold())
    } else {
        format!(
            "Version {} is already with App Review, nothing submitted",
            style(version_id).bold()
        )
    }
}

async fn cancel(cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let app_id = ctx.app_id(cli)?;
    let canceled = ctx.connect.review_submitter().cancel(&app_id).await?;

    if cli.format == OutputFormat::Json {
        return print_json(&CancelReport { canceled });
    }
    if !cli.quiet {
        for id in &canceled {
            output::success(&format!("Canceled submission {}", id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(submitted: bool) -> SubmissionReport {
        SubmissionReport {
            container_id: "c1".to_string(),
            container_created: false,
            attach: AttachOutcome::AlreadyMember,
            submitted,
        }
    }

    #[test]
    fn test_summary_only_claims_a_submit_that_happened() {
        console::set_colors_enabled(false);
        assert_eq!(summary("v1", &report(true)), "Version v1 submitted for review");
        assert_eq!(
            summary("v1", &report(false)),
            "Version v1 is already with App Review, nothing submitted"
        );
    }
}
