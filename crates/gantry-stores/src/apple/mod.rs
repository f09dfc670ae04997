//! App Store Connect publishing pipeline
//!
//! ```ignore
//! use gantry_stores::apple::AppStoreConnect;
//! use gantry_stores::{AssetKind, AssetUploader, Platform, PollingConfig, UploadableAsset};
//!
//! let connect = AppStoreConnect::new(credentials, Platform::Ios, PollingConfig::default())?;
//! let asset = UploadableAsset::from_path(&path).await?;
//! let kind = AssetKind::Screenshot { set_id };
//! connect.asset_uploader()?.upload(&asset, &kind).await?;
//! ```

mod assets;
mod auth;
mod builds;
mod gateway;
mod review;
mod screenshots;
mod transfer;
mod transporter;

pub use assets::AssetReservationClient;
pub use auth::TokenProvider;
pub use builds::BuildPublishPoller;
pub use gateway::{ApiGateway, ApiGatewayExt, AppStoreConnectGateway, Endpoint};
pub use review::ReviewSubmissionStateMachine;
pub use screenshots::{
    discover_local_sets, plan_screenshot_sets, LocalScreenshotSet, RemoteScreenshotSet,
    ScreenshotSetExecutor, ScreenshotSetOutcome, ScreenshotSetPlan,
};
pub use transfer::{md5_hex, ChunkTransferEngine, ChunkTransport, HttpChunkTransport};
pub use transporter::TransporterUpload;

use std::sync::Arc;

use crate::error::Result;
use crate::types::{Credentials, Platform, PollingConfig, DEFAULT_API_BASE_URL};

/// Builds the pipeline components around one shared gateway
pub struct AppStoreConnect {
    gateway: Arc<dyn ApiGateway>,
    platform: Platform,
    polling: PollingConfig,
}

impl AppStoreConnect {
    /// Pipeline against the public App Store Connect API
    pub fn new(credentials: Credentials, platform: Platform, polling: PollingConfig) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_API_BASE_URL, platform, polling)
    }

    pub fn with_base_url(
        credentials: Credentials,
        base_url: &str,
        platform: Platform,
        polling: PollingConfig,
    ) -> Result<Self> {
        let gateway = AppStoreConnectGateway::with_base_url(credentials, base_url)?;
        Ok(Self::from_gateway(Arc::new(gateway), platform, polling))
    }

    /// Pipeline over an existing gateway
    pub fn from_gateway(
        gateway: Arc<dyn ApiGateway>,
        platform: Platform,
        polling: PollingConfig,
    ) -> Self {
        Self {
            gateway,
            platform,
            polling,
        }
    }

    pub fn gateway(&self) -> Arc<dyn ApiGateway> {
        self.gateway.clone()
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    /// Asset uploader sending chunks over HTTP
    pub fn asset_uploader(&self) -> Result<AssetReservationClient> {
        Ok(AssetReservationClient::new(
            self.gateway.clone(),
            ChunkTransferEngine::http()?,
            self.polling.clone(),
        ))
    }

    pub fn build_poller(&self) -> BuildPublishPoller {
        BuildPublishPoller::new(self.gateway.clone(), self.polling.clone())
    }

    pub fn review_submitter(&self) -> ReviewSubmissionStateMachine {
        ReviewSubmissionStateMachine::new(self.gateway.clone(), self.platform, &self.polling)
    }

    /// Screenshot executor uploading through [`Self::asset_uploader`]
    pub fn screenshot_executor(&self) -> Result<ScreenshotSetExecutor> {
        Ok(ScreenshotSetExecutor::new(
            self.gateway.clone(),
            Arc::new(self.asset_uploader()?),
            &self.polling,
        ))
    }
}
