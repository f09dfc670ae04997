//! Review submission state machine
//!
//! Submitting a version means finding or creating a review submission
//! container for the app, making sure the version is one of its items
//! exactly once, then flipping the container to submitted.
//!
//! The membership scan is advisory: two concurrent submitters can both
//! miss each other's item. A 409 on item creation is therefore absorbed
//! and reported as [`AttachOutcome::AlreadyAttached`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::gateway::{ApiGateway, ApiGatewayExt, Endpoint};
use crate::error::{PublishError, Result};
use crate::traits::ReviewSubmitter;
use crate::types::{
    AttachOutcome, Platform, PollingConfig, SubmissionContainer, SubmissionItem, SubmissionReport,
    SubmissionState,
};

#[derive(Debug, Deserialize)]
struct ListDocument<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SingleDocument<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ContainerResource {
    id: String,
    #[serde(default)]
    attributes: ContainerAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerAttributes {
    state: Option<String>,
}

impl From<ContainerResource> for SubmissionContainer {
    fn from(resource: ContainerResource) -> Self {
        Self {
            id: resource.id,
            state: resource
                .attributes
                .state
                .as_deref()
                .map(SubmissionState::from_remote)
                .unwrap_or(SubmissionState::ReadyForReview),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemResource {
    id: String,
    #[serde(default)]
    relationships: ItemRelationships,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ItemRelationships {
    app_store_version: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: Option<ResourceIdentifier>,
}

#[derive(Debug, Deserialize)]
struct ResourceIdentifier {
    id: String,
}

impl From<ItemResource> for SubmissionItem {
    fn from(resource: ItemResource) -> Self {
        Self {
            id: resource.id,
            version_id: resource
                .relationships
                .app_store_version
                .and_then(|r| r.data)
                .map(|d| d.id),
        }
    }
}

/// States a container can be cancelled from
const ACTIVE_STATES: [SubmissionState; 3] = [
    SubmissionState::ReadyForReview,
    SubmissionState::WaitingForReview,
    SubmissionState::InReview,
];

/// States of a container that can still hold a pending submission
const OPEN_STATES: [SubmissionState; 4] = [
    SubmissionState::ReadyForReview,
    SubmissionState::WaitingForReview,
    SubmissionState::InReview,
    SubmissionState::UnresolvedIssues,
];

/// Whether the container is already with App Review and must not be submitted again
fn is_under_review(state: &SubmissionState) -> bool {
    matches!(
        state,
        SubmissionState::WaitingForReview | SubmissionState::InReview
    )
}

fn state_filter(states: &[SubmissionState]) -> String {
    states
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// [`ReviewSubmitter`] over the App Store Connect review submission API
pub struct ReviewSubmissionStateMachine {
    gateway: Arc<dyn ApiGateway>,
    platform: Platform,
    page_limit: u32,
}

impl ReviewSubmissionStateMachine {
    pub fn new(gateway: Arc<dyn ApiGateway>, platform: Platform, polling: &PollingConfig) -> Self {
        Self {
            gateway,
            platform,
            page_limit: polling.submission_page_limit,
        }
    }

    /// Review submission containers of the app in one of `states`
    ///
    /// Filtered by state on the remote, then checked again here.
    pub async fn list_containers(
        &self,
        app_id: &str,
        states: &[SubmissionState],
    ) -> Result<Vec<SubmissionContainer>> {
        let endpoint = Endpoint::get("/reviewSubmissions")
            .query("filter[app]", app_id)
            .query("filter[state]", state_filter(states))
            .query("limit", self.page_limit.to_string());

        let doc: ListDocument<ContainerResource> = self.gateway.request(endpoint).await?;
        Ok(doc
            .data
            .into_iter()
            .map(SubmissionContainer::from)
            .filter(|c| states.contains(&c.state))
            .collect())
    }

    /// Items of one container
    pub async fn list_items(&self, container_id: &str) -> Result<Vec<SubmissionItem>> {
        let endpoint = Endpoint::get(format!("/reviewSubmissions/{}/items", container_id))
            .query("include", "appStoreVersion");

        let doc: ListDocument<ItemResource> = self.gateway.request(endpoint).await?;
        Ok(doc.data.into_iter().map(SubmissionItem::from).collect())
    }

    async fn create_container(&self, app_id: &str) -> Result<SubmissionContainer> {
        let body = json!({
            "data": {
                "type": "reviewSubmissions",
                "attributes": {"platform": self.platform.as_str()},
                "relationships": {
                    "app": {"data": {"type": "apps", "id": app_id}}
                }
            }
        });

        let doc: SingleDocument<ContainerResource> = self
            .gateway
            .request(Endpoint::post("/reviewSubmissions", body))
            .await?;
        Ok(doc.data.into())
    }

    /// Create the item linking `version_id` to the container
    ///
    /// A 409 means the version is already attached and is not an error.
    pub async fn attach(&self, container_id: &str, version_id: &str) -> Result<AttachOutcome> {
        let body = json!({
            "data": {
                "type": "reviewSubmissionItems",
                "relationships": {
                    "reviewSubmission": {
                        "data": {"type": "reviewSubmissions", "id": container_id}
                    },
                    "appStoreVersion": {
                        "data": {"type": "appStoreVersions", "id": version_id}
                    }
                }
            }
        });

        match self
            .gateway
            .request_no_content(Endpoint::post("/reviewSubmissionItems", body))
            .await
        {
            Ok(()) => Ok(AttachOutcome::Created),
            Err(e) if e.is_conflict() => {
                info!(
                    container_id,
                    version_id, "version already attached, conflict absorbed"
                );
                Ok(AttachOutcome::AlreadyAttached)
            }
            Err(e) => Err(e),
        }
    }

    async fn patch_container(&self, container_id: &str, attributes: serde_json::Value) -> Result<()> {
        let body = json!({
            "data": {
                "type": "reviewSubmissions",
                "id": container_id,
                "attributes": attributes,
            }
        });

        self.gateway
            .request_no_content(Endpoint::patch(
                format!("/reviewSubmissions/{}", container_id),
                body,
            ))
            .await
    }
}

#[async_trait]
impl ReviewSubmitter for ReviewSubmissionStateMachine {
    #[instrument(skip(self))]
    async fn submit(&self, app_id: &str, version_id: &str) -> Result<SubmissionReport> {
        let containers = self.list_containers(app_id, &OPEN_STATES).await?;

        let mut member_of = None;
        for container in &containers {
            let items = self.list_items(&container.id).await?;
            if items
                .iter()
                .any(|item| item.version_id.as_deref() == Some(version_id))
            {
                member_of = Some(container.clone());
                break;
            }
        }

        let (container, container_created, attach) = match member_of {
            Some(container) => {
                debug!(container_id = %container.id, "version already in container");
                (container, false, AttachOutcome::AlreadyMember)
            }
            None => {
                let (container, created) =
                    match containers.iter().find(|c| c.state.is_appendable()) {
                        Some(container) => (container.clone(), false),
                        None => {
                            let container = self.create_container(app_id).await?;
                            info!(container_id = %container.id, "created review submission");
                            (container, true)
                        }
                    };
                let attach = self.attach(&container.id, version_id).await?;
                (container, created, attach)
            }
        };

        let submitted = container_created || !is_under_review(&container.state);
        if submitted {
            self.patch_container(&container.id, json!({"submitted": true}))
                .await?;
            info!(container_id = %container.id, "submitted for review");
        } else {
            info!(
                container_id = %container.id,
                state = %container.state,
                "container already with review"
            );
        }

        Ok(SubmissionReport {
            container_id: container.id,
            container_created,
            attach,
            submitted,
        })
    }

    #[instrument(skip(self))]
    async fn cancel(&self, app_id: &str) -> Result<Vec<String>> {
        let active = self.list_containers(app_id, &ACTIVE_STATES).await?;

        if active.is_empty() {
            return Err(PublishError::SubmissionNotFound(app_id.to_string()));
        }

        let mut cancelled = Vec::with_capacity(active.len());
        for container in active {
            self.patch_container(
                &container.id,
                json!({"submitted": false, "canceled": true}),
            )
            .await?;
            info!(container_id = %container.id, "cancelled review submission");
            cancelled.push(container.id);
        }

        Ok(cancelled)
    }
}
