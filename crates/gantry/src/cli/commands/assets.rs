//! Assets command - Upload a single asset through reserve, transfer, commit and poll

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use console::style;
use tracing::info;

use gantry_stores::{AssetKind, AssetUploader, UploadableAsset};

use super::{print_json, Context};
use crate::cli::{output, Cli, OutputFormat};

/// Asset uploads
#[derive(Debug, Args)]
pub struct AssetsCommand {
    #[command(subcommand)]
    pub subcommand: AssetsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum AssetsSubcommand {
    /// Upload one file and wait until the remote has processed it
    Upload(UploadArgs),
}

/// Kind of asset to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Screenshot in a screenshot set
    Screenshot,
    /// App preview video in a preview set
    Preview,
    /// Attachment on an App Review detail
    Attachment,
}

/// Upload arguments
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,

    /// Kind of asset
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Id of the parent set or review detail
    #[arg(long)]
    pub parent: String,
}

impl UploadArgs {
    fn asset_kind(&self) -> AssetKind {
        match self.kind {
            KindArg::Screenshot => AssetKind::Screenshot {
                set_id: self.parent.clone(),
            },
            KindArg::Preview => AssetKind::AppPreview {
                set_id: self.parent.clone(),
            },
            KindArg::Attachment => AssetKind::ReviewAttachment {
                review_detail_id: self.parent.clone(),
            },
        }
    }
}

impl AssetsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.subcommand {
            AssetsSubcommand::Upload(args) => upload(args, cli).await,
        }
    }
}

async fn upload(args: &UploadArgs, cli: &Cli) -> anyhow::Result<()> {
    let ctx = Context::load(cli).await?;
    let asset = UploadableAsset::from_path(&args.file).await?;
    let kind = args.asset_kind();
    info!(file = %asset.file_name, size = asset.byte_length(), "uploading asset");

    let spinner = output::spinner(
        &format!("Uploading {}", style(&asset.file_name).cyan()),
        cli.is_text(),
    );
    let result = ctx.connect.asset_uploader()?.upload(&asset, &kind).await;
    spinner.finish_and_clear();
    let uploaded = result?;

    if cli.format == OutputFormat::Json {
        return print_json(&uploaded);
    }

    if !cli.quiet {
        output::success(&format!("Uploaded {}", uploaded.file_name));
        println!("{}", output::key_value("Asset", &uploaded.id));
        println!("{}", output::key_value("Type", kind.resource_type()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_upload_args_map_to_asset_kind() {
        let cli = Cli::try_parse_from([
            "gantry",
            "assets",
            "upload",
            "notes.pdf",
            "--kind",
            "attachment",
            "--parent",
            "rd-1",
        ])
        .unwrap();

        let crate::cli::Commands::Assets(cmd) = cli.command else {
            panic!("expected assets command");
        };
        let AssetsSubcommand::Upload(args) = cmd.subcommand;
        assert_eq!(
            args.asset_kind(),
            AssetKind::ReviewAttachment {
                review_detail_id: "rd-1".to_string()
            }
        );
    }
}
