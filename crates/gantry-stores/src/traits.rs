//! Pipeline component traits
//!
//! Each component of the pipeline sits behind one of these narrow traits so
//! callers can be tested against fakes of the others.

use crate::error::Result;
use crate::types::*;

/// Uploads one asset through reserve, transfer, commit and poll
#[async_trait::async_trait]
pub trait AssetUploader: Send + Sync {
    /// Upload `asset` as a `kind` asset
    ///
    /// Returns once the remote reports the asset as processed. A failure in
    /// any phase aborts the upload without retrying.
    async fn upload(&self, asset: &UploadableAsset, kind: &AssetKind) -> Result<UploadedAsset>;
}

/// Waits for a newly uploaded build to finish processing
#[async_trait::async_trait]
pub trait BuildWaiter: Send + Sync {
    /// Id of the most recently uploaded build, if any
    ///
    /// Capture this before starting an external upload and pass it to
    /// [`BuildWaiter::wait_for_new_build`].
    async fn latest_build_id(&self, app_id: &str) -> Result<Option<String>>;

    /// Wait until a build newer than `latest_before` is valid
    async fn wait_for_new_build(
        &self,
        app_id: &str,
        latest_before: Option<&str>,
    ) -> Result<DraftBuild>;
}

/// Drives review submission containers
#[async_trait::async_trait]
pub trait ReviewSubmitter: Send + Sync {
    /// Make `version_id` a member of exactly one container and submit it
    async fn submit(&self, app_id: &str, version_id: &str) -> Result<SubmissionReport>;

    /// Cancel every active container of the app, returning their ids
    async fn cancel(&self, app_id: &str) -> Result<Vec<String>>;
}
