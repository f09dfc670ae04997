//! Build publish poller
//!
//! The builds endpoint cannot be asked for "the upload I just made", so the
//! caller records the newest build id before running the upload tool and
//! the poller waits for a different build to show up at the head of the
//! upload-date-descending list.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::gateway::{ApiGateway, ApiGatewayExt, Endpoint};
use crate::error::{PublishError, Result};
use crate::traits::BuildWaiter;
use crate::types::{BuildProcessingState, DraftBuild, PollingConfig};

#[derive(Debug, Deserialize)]
struct BuildsDocument {
    #[serde(default)]
    data: Vec<BuildResource>,
}

#[derive(Debug, Deserialize)]
struct BuildResource {
    id: String,
    #[serde(default)]
    attributes: BuildAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BuildAttributes {
    version: Option<String>,
    processing_state: Option<String>,
}

impl From<BuildResource> for DraftBuild {
    fn from(resource: BuildResource) -> Self {
        Self {
            id: resource.id,
            version: resource.attributes.version.unwrap_or_default(),
            processing_state: resource
                .attributes
                .processing_state
                .as_deref()
                .map(BuildProcessingState::from_remote)
                .unwrap_or(BuildProcessingState::Processing),
        }
    }
}

/// [`BuildWaiter`] polling the App Store Connect builds list
pub struct BuildPublishPoller {
    gateway: Arc<dyn ApiGateway>,
    polling: PollingConfig,
}

impl BuildPublishPoller {
    pub fn new(gateway: Arc<dyn ApiGateway>, polling: PollingConfig) -> Self {
        Self { gateway, polling }
    }

    /// Most recently uploaded builds of the app, newest first
    pub async fn recent_builds(&self, app_id: &str) -> Result<Vec<DraftBuild>> {
        let endpoint = Endpoint::get("/builds")
            .query("filter[app]", app_id)
            .query("sort", "-uploadedDate")
            .query("limit", self.polling.build_list_limit.to_string());

        let doc: BuildsDocument = self.gateway.request(endpoint).await?;
        Ok(doc.data.into_iter().map(DraftBuild::from).collect())
    }
}

#[async_trait]
impl BuildWaiter for BuildPublishPoller {
    async fn latest_build_id(&self, app_id: &str) -> Result<Option<String>> {
        let builds = self.recent_builds(app_id).await?;
        Ok(builds.into_iter().next().map(|b| b.id))
    }

    #[instrument(skip(self))]
    async fn wait_for_new_build(
        &self,
        app_id: &str,
        latest_before: Option<&str>,
    ) -> Result<DraftBuild> {
        let timeout = self.polling.build_poll_timeout();
        let interval = self.polling.build_poll_interval();
        let started = Instant::now();

        info!("waiting for new build to finish processing");

        loop {
            let builds = self.recent_builds(app_id).await?;

            match builds.into_iter().next() {
                Some(build) if Some(build.id.as_str()) != latest_before => {
                    match build.processing_state.clone() {
                        BuildProcessingState::Valid => {
                            info!(build_id = %build.id, version = %build.version, "build is valid");
                            return Ok(build);
                        }
                        BuildProcessingState::Processing => {
                            debug!(build_id = %build.id, "build still processing");
                        }
                        state => {
                            return Err(PublishError::BuildProcessingFailed {
                                build_id: build.id.clone(),
                                state: state.to_string(),
                            });
                        }
                    }
                }
                _ => debug!("no new build yet"),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(PublishError::Timeout(format!(
                    "no new valid build for app {} after {}s",
                    app_id,
                    timeout.as_secs()
                )));
            }

            tokio::time::sleep(interval.min(timeout - elapsed)).await;
        }
    }
}
