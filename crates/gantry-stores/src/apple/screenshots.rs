//! Screenshot set planning and execution
//!
//! Replacing the screenshots of a localization happens in two steps. A pure
//! planning step pairs each local device set with the remote set of the same
//! display type and decides what to delete and upload. The executor then
//! applies the plans one set at a time.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::gateway::{ApiGateway, ApiGatewayExt, Endpoint};
use crate::error::Result;
use crate::traits::AssetUploader;
use crate::types::{AssetKind, PollingConfig, UploadableAsset, UploadedAsset};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Screenshots on disk for one display type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalScreenshotSet {
    /// Display type, e.g. `APP_IPHONE_67`
    pub display_type: String,

    /// Image files in upload order
    pub files: Vec<PathBuf>,
}

/// A screenshot set that exists on the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteScreenshotSet {
    pub id: String,
    pub display_type: String,
    pub screenshot_ids: Vec<String>,
}

/// What to do for one display type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotSetPlan {
    pub display_type: String,

    /// Remote set to reuse; a new one is created when absent
    pub existing_set_id: Option<String>,

    /// Remote screenshots to delete before uploading
    pub delete_ids: Vec<String>,

    /// Files to upload, in order
    pub upload_files: Vec<PathBuf>,
}

/// What happened to one display type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotSetOutcome {
    pub display_type: String,
    pub set_id: String,
    pub set_created: bool,
    pub deleted: usize,
    pub uploaded: Vec<UploadedAsset>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Find screenshot sets under `dir`
///
/// Each sub-directory is a display type and holds that set's images, which
/// are uploaded in file name order. Directories without images are skipped.
pub async fn discover_local_sets(dir: &Path) -> Result<Vec<LocalScreenshotSet>> {
    let mut sets = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !fs::metadata(&path).await?.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let mut files = Vec::new();
        let mut images = fs::read_dir(&path).await?;
        while let Some(image) = images.next_entry().await? {
            let image_path = image.path();
            if is_image(&image_path) && fs::metadata(&image_path).await?.is_file() {
                files.push(image_path);
            }
        }

        if files.is_empty() {
            debug!(display_type = name, "no images, skipping");
            continue;
        }

        files.sort();
        sets.push(LocalScreenshotSet {
            display_type: name.to_uppercase(),
            files,
        });
    }

    sets.sort_by(|a, b| a.display_type.cmp(&b.display_type));
    Ok(sets)
}

/// Pair local sets with remote sets and decide the work for each
///
/// Remote sets whose display type has no local counterpart are left alone.
pub fn plan_screenshot_sets(
    local: &[LocalScreenshotSet],
    remote: &[RemoteScreenshotSet],
) -> Vec<ScreenshotSetPlan> {
    local
        .iter()
        .map(|set| {
            let existing = remote.iter().find(|r| r.display_type == set.display_type);
            ScreenshotSetPlan {
                display_type: set.display_type.clone(),
                existing_set_id: existing.map(|r| r.id.clone()),
                delete_ids: existing
                    .map(|r| r.screenshot_ids.clone())
                    .unwrap_or_default(),
                upload_files: set.files.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SetsDocument {
    #[serde(default)]
    data: Vec<SetResource>,
}

#[derive(Debug, Deserialize)]
struct CreatedSetDocument {
    data: SetResource,
}

#[derive(Debug, Deserialize)]
struct SetResource {
    id: String,
    #[serde(default)]
    attributes: SetAttributes,
    #[serde(default)]
    relationships: SetRelationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SetAttributes {
    screenshot_display_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SetRelationships {
    app_screenshots: Option<ToMany>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToMany {
    data: Vec<Identifier>,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    id: String,
}

/// Applies screenshot set plans for a version localization
pub struct ScreenshotSetExecutor {
    gateway: Arc<dyn ApiGateway>,
    uploader: Arc<dyn AssetUploader>,
    settle_delay: Duration,
}

impl ScreenshotSetExecutor {
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        uploader: Arc<dyn AssetUploader>,
        polling: &PollingConfig,
    ) -> Self {
        Self {
            gateway,
            uploader,
            settle_delay: polling.screenshot_settle_delay(),
        }
    }

    /// Screenshot sets currently attached to the localization
    pub async fn remote_sets(&self, localization_id: &str) -> Result<Vec<RemoteScreenshotSet>> {
        let endpoint = Endpoint::get(format!(
            "/appStoreVersionLocalizations/{}/appScreenshotSets",
            localization_id
        ))
        .query("include", "appScreenshots");

        let doc: SetsDocument = self.gateway.request(endpoint).await?;
        Ok(doc
            .data
            .into_iter()
            .map(|set| RemoteScreenshotSet {
                id: set.id,
                display_type: set.attributes.screenshot_display_type.unwrap_or_default(),
                screenshot_ids: set
                    .relationships
                    .app_screenshots
                    .map(|r| r.data.into_iter().map(|i| i.id).collect())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn create_set(&self, localization_id: &str, display_type: &str) -> Result<String> {
        let body = json!({
            "data": {
                "type": "appScreenshotSets",
                "attributes": {"screenshotDisplayType": display_type},
                "relationships": {
                    "appStoreVersionLocalization": {
                        "data": {"type": "appStoreVersionLocalizations", "id": localization_id}
                    }
                }
            }
        });

        let doc: CreatedSetDocument = self
            .gateway
            .request(Endpoint::post("/appScreenshotSets", body))
            .await?;
        Ok(doc.data.id)
    }

    /// Apply `plans` one set at a time
    ///
    /// Within a set every deletion finishes before the settle delay, and the
    /// delay finishes before the first upload. The first failure stops the
    /// run; sets already processed stay as they are.
    #[instrument(skip(self, plans), fields(sets = plans.len()))]
    pub async fn execute(
        &self,
        localization_id: &str,
        plans: &[ScreenshotSetPlan],
    ) -> Result<Vec<ScreenshotSetOutcome>> {
        let mut outcomes = Vec::with_capacity(plans.len());

        for plan in plans {
            let (set_id, set_created) = match &plan.existing_set_id {
                Some(id) => (id.clone(), false),
                None => {
                    let id = self.create_set(localization_id, &plan.display_type).await?;
                    debug!(display_type = %plan.display_type, set_id = %id, "created screenshot set");
                    (id, true)
                }
            };

            for screenshot_id in &plan.delete_ids {
                self.gateway
                    .request_no_content(Endpoint::delete(format!(
                        "/appScreenshots/{}",
                        screenshot_id
                    )))
                    .await?;
            }

            if !plan.delete_ids.is_empty() && !self.settle_delay.is_zero() {
                warn!(
                    display_type = %plan.display_type,
                    delay_secs = self.settle_delay.as_secs(),
                    "waiting for screenshot deletions to settle"
                );
                tokio::time::sleep(self.settle_delay).await;
            }

            let kind = AssetKind::Screenshot {
                set_id: set_id.clone(),
            };
            let mut uploaded = Vec::with_capacity(plan.upload_files.len());
            for file in &plan.upload_files {
                let asset = UploadableAsset::from_path(file).await?;
                uploaded.push(self.uploader.upload(&asset, &kind).await?);
            }

            info!(
                display_type = %plan.display_type,
                deleted = plan.delete_ids.len(),
                uploaded = uploaded.len(),
                "screenshot set updated"
            );

            outcomes.push(ScreenshotSetOutcome {
                display_type: plan.display_type.clone(),
                set_id,
                set_created,
                deleted: plan.delete_ids.len(),
                uploaded,
            });
        }

        Ok(outcomes)
    }

    /// Replace the localization's screenshots with the sets found under `dir`
    pub async fn push(
        &self,
        localization_id: &str,
        dir: &Path,
    ) -> Result<Vec<ScreenshotSetOutcome>> {
        let local = discover_local_sets(dir).await?;
        let remote = self.remote_sets(localization_id).await?;
        let plans = plan_screenshot_sets(&local, &remote);
        self.execute(localization_id, &plans).await
    }
}
