//! Asset reservation client
//!
//! Uploads screenshots, app previews and review attachments in four
//! phases, each gated on the previous one:
//!
//! 1. reserve an asset record with the file name and size
//! 2. transfer the bytes through the reservation's upload operations
//! 3. commit with the MD5 checksum of the payload
//! 4. poll the record until the remote finishes processing it

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::gateway::{ApiGateway, ApiGatewayExt, Endpoint};
use super::transfer::{md5_hex, ChunkTransferEngine};
use crate::error::{PublishError, Result};
use crate::traits::AssetUploader;
use crate::types::{
    AssetKind, AssetProcessingState, PollingConfig, UploadOperation, UploadReservation,
    UploadableAsset, UploadedAsset,
};

#[derive(Debug, Deserialize)]
struct AssetDocument {
    data: AssetResource,
}

#[derive(Debug, Deserialize)]
struct AssetResource {
    id: String,
    #[serde(default)]
    attributes: AssetAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AssetAttributes {
    upload_operations: Option<Vec<RemoteOperation>>,
    asset_delivery_state: Option<DeliveryState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteOperation {
    method: String,
    url: String,
    offset: u64,
    length: u64,
    #[serde(default)]
    request_headers: Vec<RemoteHeader>,
}

#[derive(Debug, Deserialize)]
struct RemoteHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct DeliveryState {
    state: String,
    #[serde(default)]
    errors: Vec<DeliveryError>,
}

#[derive(Debug, Deserialize)]
struct DeliveryError {
    code: Option<String>,
    description: Option<String>,
}

impl From<RemoteOperation> for UploadOperation {
    fn from(op: RemoteOperation) -> Self {
        Self {
            offset: op.offset,
            length: op.length,
            method: op.method,
            url: op.url,
            headers: op
                .request_headers
                .into_iter()
                .map(|h| (h.name, h.value))
                .collect(),
        }
    }
}

/// Render remote delivery errors as `[code] description`, joined with `; `
fn format_delivery_errors(errors: &[DeliveryError]) -> String {
    if errors.is_empty() {
        return "no details reported".to_string();
    }

    errors
        .iter()
        .map(|e| match (&e.code, &e.description) {
            (Some(code), Some(description)) => format!("[{}] {}", code, description),
            (Some(code), None) => format!("[{}]", code),
            (None, Some(description)) => description.clone(),
            (None, None) => "unknown error".to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// [`AssetUploader`] for App Store Connect asset resources
pub struct AssetReservationClient {
    gateway: Arc<dyn ApiGateway>,
    engine: ChunkTransferEngine,
    polling: PollingConfig,
}

impl AssetReservationClient {
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        engine: ChunkTransferEngine,
        polling: PollingConfig,
    ) -> Self {
        Self {
            gateway,
            engine,
            polling,
        }
    }

    /// Create the asset record and return its upload operations
    pub async fn reserve(
        &self,
        asset: &UploadableAsset,
        kind: &AssetKind,
    ) -> Result<UploadReservation> {
        let body = json!({
            "data": {
                "type": kind.resource_type(),
                "attributes": {
                    "fileName": asset.file_name,
                    "fileSize": asset.byte_length(),
                },
                "relationships": {
                    kind.parent_relationship(): {
                        "data": {
                            "type": kind.parent_type(),
                            "id": kind.parent_id(),
                        }
                    }
                }
            }
        });

        let doc: AssetDocument = self
            .gateway
            .request(Endpoint::post(format!("/{}", kind.resource_type()), body))
            .await
            .map_err(|e| PublishError::ReservationFailed {
                file_name: asset.file_name.clone(),
                source: Box::new(e),
            })?;

        let operations = doc
            .data
            .attributes
            .upload_operations
            .unwrap_or_default()
            .into_iter()
            .map(UploadOperation::from)
            .collect::<Vec<_>>();

        debug!(
            asset_id = %doc.data.id,
            operations = operations.len(),
            "reserved asset"
        );

        Ok(UploadReservation {
            asset_id: doc.data.id,
            operations,
        })
    }

    /// Mark the asset as uploaded, sending the payload checksum
    pub async fn commit(
        &self,
        asset: &UploadableAsset,
        kind: &AssetKind,
        asset_id: &str,
    ) -> Result<()> {
        let body = json!({
            "data": {
                "type": kind.resource_type(),
                "id": asset_id,
                "attributes": {
                    "sourceFileChecksum": md5_hex(&asset.bytes),
                    "uploaded": true,
                }
            }
        });

        self.gateway
            .request_no_content(Endpoint::patch(
                format!("/{}/{}", kind.resource_type(), asset_id),
                body,
            ))
            .await
            .map_err(|e| PublishError::CommitFailed {
                file_name: asset.file_name.clone(),
                source: Box::new(e),
            })
    }

    /// Poll the asset record until it reaches a terminal state
    ///
    /// Makes at most `asset_poll_max_attempts` requests, sleeping the poll
    /// interval between them but not after the last one.
    pub async fn poll_until_processed(
        &self,
        asset: &UploadableAsset,
        kind: &AssetKind,
        asset_id: &str,
    ) -> Result<()> {
        let max_attempts = self.polling.asset_poll_max_attempts;
        let path = format!("/{}/{}", kind.resource_type(), asset_id);

        for attempt in 1..=max_attempts {
            let doc: AssetDocument = self.gateway.request(Endpoint::get(path.clone())).await?;

            let (state, errors) = match doc.data.attributes.asset_delivery_state {
                Some(delivery) => (
                    AssetProcessingState::from_remote(&delivery.state),
                    delivery.errors,
                ),
                None => (AssetProcessingState::Processing, Vec::new()),
            };

            debug!(attempt, max_attempts, state = %state, "polled asset");

            match state {
                AssetProcessingState::Complete => return Ok(()),
                AssetProcessingState::Failed => {
                    return Err(PublishError::ProcessingFailed {
                        file_name: asset.file_name.clone(),
                        details: format_delivery_errors(&errors),
                    });
                }
                _ => {}
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.polling.asset_poll_interval()).await;
            }
        }

        Err(PublishError::Timeout(asset.file_name.clone()))
    }
}

#[async_trait]
impl AssetUploader for AssetReservationClient {
    #[instrument(skip_all, fields(file = %asset.file_name, kind = kind.resource_type()))]
    async fn upload(&self, asset: &UploadableAsset, kind: &AssetKind) -> Result<UploadedAsset> {
        info!(bytes = asset.byte_length(), "uploading asset");

        let reservation = self.reserve(asset, kind).await?;
        self.engine.transfer_all(asset, &reservation).await?;
        self.commit(asset, kind, &reservation.asset_id).await?;
        self.poll_until_processed(asset, kind, &reservation.asset_id)
            .await?;

        info!(asset_id = %reservation.asset_id, "asset processed");
        Ok(UploadedAsset {
            id: reservation.asset_id,
            file_name: asset.file_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apple::gateway::testing::{api_error, ScriptedGateway};
    use crate::apple::transfer::testing::RecordingTransport;
    use reqwest::Method;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn screenshot_kind() -> AssetKind {
        AssetKind::Screenshot {
            set_id: "set-1".to_string(),
        }
    }

    fn shot() -> UploadableAsset {
        UploadableAsset::new("shot1.png", vec![7u8; 204_800])
    }

    fn reservation_doc() -> Value {
        json!({
            "data": {
                "id": "r1",
                "type": "appScreenshots",
                "attributes": {
                    "fileName": "shot1.png",
                    "fileSize": 204800,
                    "uploadOperations": [{
                        "method": "PUT",
                        "url": "https://storage.example.com/r1",
                        "offset": 0,
                        "length": 204800,
                        "requestHeaders": [{"name": "Content-Type", "value": "image/png"}]
                    }],
                    "assetDeliveryState": {"state": "AWAITING_UPLOAD"}
                }
            }
        })
    }

    fn state_doc(state: &str, errors: Value) -> Value {
        json!({
            "data": {
                "id": "r1",
                "type": "appScreenshots",
                "attributes": {
                    "assetDeliveryState": {"state": state, "errors": errors}
                }
            }
        })
    }

    /// Gateway that reserves `r1` and answers polls from `states` (repeating the last one)
    fn scripted(states: Vec<Value>) -> Arc<ScriptedGateway> {
        let mut polls: VecDeque<Value> = states.into();
        Arc::new(ScriptedGateway::new(move |ep| {
            match ep.method {
                Method::POST => Ok(Some(reservation_doc())),
                Method::PATCH => Ok(None),
                _ => {
                    let next = if polls.len() > 1 {
                        polls.pop_front()
                    } else {
                        polls.front().cloned()
                    };
                    Ok(next)
                }
            }
        }))
    }

    fn client(
        gateway: Arc<ScriptedGateway>,
        transport: Arc<RecordingTransport>,
        polling: PollingConfig,
    ) -> AssetReservationClient {
        AssetReservationClient::new(gateway, ChunkTransferEngine::new(transport), polling)
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_screenshot_upload() {
        let gateway = scripted(vec![
            state_doc("UPLOAD_COMPLETE", json!([])),
            state_doc("UPLOAD_COMPLETE", json!([])),
            state_doc("COMPLETE", json!([])),
        ]);
        let transport = Arc::new(RecordingTransport::default());
        let client = client(gateway.clone(), transport.clone(), PollingConfig::default());

        let uploaded = client.upload(&shot(), &screenshot_kind()).await.unwrap();

        assert_eq!(uploaded.id, "r1");
        assert_eq!(uploaded.file_name, "shot1.png");
        assert_eq!(transport.offsets(), vec![0]);
        assert_eq!(gateway.count(Method::GET, "/appScreenshots/r1"), 3);

        let calls = gateway.calls();
        let reserve = &calls[0];
        assert_eq!(reserve.path, "/appScreenshots");
        let body = reserve.body.as_ref().unwrap();
        assert_eq!(body["data"]["attributes"]["fileSize"], 204800);
        assert_eq!(
            body["data"]["relationships"]["appScreenshotSet"]["data"]["id"],
            "set-1"
        );

        let commit = &calls[1];
        assert_eq!(commit.method, Method::PATCH);
        let attributes = &commit.body.as_ref().unwrap()["data"]["attributes"];
        assert_eq!(attributes["uploaded"], true);
        assert_eq!(attributes["sourceFileChecksum"], md5_hex(&shot().bytes));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_processing_reports_remote_errors() {
        let gateway = scripted(vec![state_doc(
            "FAILED",
            json!([{"code": "400", "description": "bad image"}]),
        )]);
        let client = client(
            gateway,
            Arc::new(RecordingTransport::default()),
            PollingConfig::default(),
        );

        let err = client.upload(&shot(), &screenshot_kind()).await.unwrap_err();

        match err {
            PublishError::ProcessingFailed { file_name, details } => {
                assert_eq!(file_name, "shot1.png");
                assert_eq!(details, "[400] bad image");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_exactly_max_attempts() {
        let gateway = scripted(vec![state_doc("UPLOAD_COMPLETE", json!([]))]);
        let polling = PollingConfig {
            asset_poll_interval_secs: 2,
            asset_poll_max_attempts: 5,
            ..PollingConfig::default()
        };
        let client = client(gateway.clone(), Arc::new(RecordingTransport::default()), polling);

        let started = tokio::time::Instant::now();
        let err = client.upload(&shot(), &screenshot_kind()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, PublishError::Timeout(ref name) if name == "shot1.png"));
        assert_eq!(gateway.count(Method::GET, "/appScreenshots/r1"), 5);
        assert!(elapsed <= Duration::from_secs(5 * 2));
        assert!(elapsed >= Duration::from_secs(4 * 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_stops_polling() {
        let gateway = scripted(vec![
            state_doc("COMPLETE", json!([])),
            state_doc("FAILED", json!([])),
        ]);
        let client = client(
            gateway.clone(),
            Arc::new(RecordingTransport::default()),
            PollingConfig::default(),
        );

        client.upload(&shot(), &screenshot_kind()).await.unwrap();
        assert_eq!(gateway.count(Method::GET, "/appScreenshots/r1"), 1);
    }

    #[tokio::test]
    async fn test_reservation_error_is_wrapped() {
        let gateway = Arc::new(ScriptedGateway::new(|_| Err(api_error(409, "Conflict"))));
        let transport = Arc::new(RecordingTransport::default());
        let client = client(gateway, transport.clone(), PollingConfig::immediate());

        let err = client.upload(&shot(), &screenshot_kind()).await.unwrap_err();

        assert!(matches!(err, PublishError::ReservationFailed { .. }));
        assert_eq!(err.api_error().map(|e| e.status), Some(409));
        assert!(transport.offsets().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_failure_skips_commit() {
        let gateway = scripted(vec![state_doc("COMPLETE", json!([]))]);
        let transport = Arc::new(RecordingTransport::with_replies(vec![Ok(500)]));
        let client = client(gateway.clone(), transport, PollingConfig::immediate());

        let err = client.upload(&shot(), &screenshot_kind()).await.unwrap_err();

        assert!(matches!(err, PublishError::TransferFailed { .. }));
        assert_eq!(gateway.count(Method::PATCH, "/appScreenshots"), 0);
    }

    #[tokio::test]
    async fn test_commit_error_is_wrapped() {
        let gateway = Arc::new(ScriptedGateway::new(|ep| match ep.method {
            Method::POST => Ok(Some(reservation_doc())),
            _ => Err(api_error(422, "Checksum mismatch")),
        }));
        let client = client(
            gateway.clone(),
            Arc::new(RecordingTransport::default()),
            PollingConfig::immediate(),
        );

        let err = client.upload(&shot(), &screenshot_kind()).await.unwrap_err();

        assert!(matches!(err, PublishError::CommitFailed { .. }));
        assert_eq!(gateway.count(Method::GET, "/appScreenshots"), 0);
    }

    #[test]
    fn test_format_delivery_errors() {
        let errors = vec![
            DeliveryError {
                code: Some("IMAGE_TOO_SMALL".to_string()),
                description: Some("too small".to_string()),
            },
            DeliveryError {
                code: None,
                description: Some("alpha channel".to_string()),
            },
        ];
        assert_eq!(
            format_delivery_errors(&errors),
            "[IMAGE_TOO_SMALL] too small; alpha channel"
        );
        assert_eq!(format_delivery_errors(&[]), "no details reported");
    }

    #[tokio::test]
    async fn test_review_attachment_uses_review_detail_parent() {
        let gateway = Arc::new(ScriptedGateway::new(|ep| match ep.method {
            Method::POST => Ok(Some(json!({
                "data": {
                    "id": "att-1",
                    "attributes": {
                        "uploadOperations": [
                            {"method": "PUT", "url": "https://s/1", "offset": 0, "length": 3},
                            {"method": "PUT", "url": "https://s/2", "offset": 3, "length": 2}
                        ]
                    }
                }
            }))),
            Method::PATCH => Ok(None),
            _ => Ok(Some(json!({
                "data": {"id": "att-1", "attributes": {"assetDeliveryState": {"state": "COMPLETE"}}}
            }))),
        }));
        let transport = Arc::new(RecordingTransport::default());
        let client = client(gateway.clone(), transport.clone(), PollingConfig::immediate());
        let kind = AssetKind::ReviewAttachment {
            review_detail_id: "rd-1".to_string(),
        };

        let uploaded = client
            .upload(&UploadableAsset::new("notes.pdf", b"hello".to_vec()), &kind)
            .await
            .unwrap();

        assert_eq!(uploaded.id, "att-1");
        assert_eq!(transport.offsets(), vec![0, 3]);
        let calls = gateway.calls();
        assert_eq!(calls[0].path, "/appStoreReviewAttachments");
        assert_eq!(
            calls[0].body.as_ref().unwrap()["data"]["relationships"]["appStoreReviewDetail"]
                ["data"]["type"],
            "appStoreReviewDetails"
        );
    }
}
