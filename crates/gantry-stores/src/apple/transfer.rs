//! Chunk transfer engine
//!
//! Executes the pre-signed byte-range requests of an upload reservation.
//! The requests go to third-party storage, so they carry exactly the
//! headers the reservation lists and never the API bearer token.

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{PublishError, Result};
use crate::types::{UploadOperation, UploadReservation, UploadableAsset};

/// Sends one pre-signed chunk request
///
/// Returns the HTTP status code, or a description of the transport failure.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn send(
        &self,
        operation: &UploadOperation,
        body: Vec<u8>,
    ) -> std::result::Result<u16, String>;
}

/// [`ChunkTransport`] over plain HTTP
pub struct HttpChunkTransport {
    client: Client,
}

impl HttpChunkTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn send(
        &self,
        operation: &UploadOperation,
        body: Vec<u8>,
    ) -> std::result::Result<u16, String> {
        let method = Method::from_bytes(operation.method.to_uppercase().as_bytes())
            .map_err(|_| format!("invalid method {}", operation.method))?;

        let mut request = self.client.request(method, &operation.url).body(body);
        for (name, value) in &operation.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }
}

/// MD5 hex digest of a payload, sent as the commit checksum
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Runs the operations of a reservation against a [`ChunkTransport`]
pub struct ChunkTransferEngine {
    transport: Arc<dyn ChunkTransport>,
}

impl ChunkTransferEngine {
    pub fn new(transport: Arc<dyn ChunkTransport>) -> Self {
        Self { transport }
    }

    /// Engine sending chunks over HTTP
    pub fn http() -> Result<Self> {
        Ok(Self::new(Arc::new(HttpChunkTransport::new()?)))
    }

    /// Transfer a single byte range of `asset`
    pub async fn transfer_operation(
        &self,
        asset: &UploadableAsset,
        operation: &UploadOperation,
    ) -> Result<()> {
        let failed = |detail: String| PublishError::TransferFailed {
            file_name: asset.file_name.clone(),
            detail,
        };

        if operation.end() > asset.byte_length() {
            return Err(failed(format!(
                "operation {}..{} is outside the {} byte payload",
                operation.offset,
                operation.end(),
                asset.byte_length()
            )));
        }

        let start = operation.offset as usize;
        let end = operation.end() as usize;
        let body = asset.bytes[start..end].to_vec();

        debug!(
            file = %asset.file_name,
            offset = operation.offset,
            length = operation.length,
            "transferring chunk"
        );

        let status = self.transport.send(operation, body).await.map_err(&failed)?;

        if !(200..300).contains(&status) {
            return Err(failed(format!(
                "chunk at offset {} returned HTTP {}",
                operation.offset, status
            )));
        }

        Ok(())
    }

    /// Transfer every operation of `reservation`, in offset order
    ///
    /// Fails before sending anything when the operations do not exactly
    /// cover the payload, and stops at the first failing chunk.
    #[instrument(skip_all, fields(file = %asset.file_name, asset_id = %reservation.asset_id))]
    pub async fn transfer_all(
        &self,
        asset: &UploadableAsset,
        reservation: &UploadReservation,
    ) -> Result<()> {
        reservation
            .verify_coverage(asset.byte_length())
            .map_err(|detail| PublishError::TransferFailed {
                file_name: asset.file_name.clone(),
                detail,
            })?;

        let mut operations: Vec<&UploadOperation> = reservation.operations.iter().collect();
        operations.sort_by_key(|op| op.offset);

        for operation in operations {
            self.transfer_operation(asset, operation).await?;
        }

        debug!(
            chunks = reservation.operations.len(),
            bytes = asset.byte_length(),
            "all chunks transferred"
        );
        Ok(())
    }
}

/// Recording transport for tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers 200 unless a status or failure was queued
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) sent: Mutex<Vec<(UploadOperation, Vec<u8>)>>,
        pub(crate) replies: Mutex<VecDeque<std::result::Result<u16, String>>>,
    }

    impl RecordingTransport {
        pub(crate) fn with_replies(
            replies: Vec<std::result::Result<u16, String>>,
        ) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        pub(crate) fn offsets(&self) -> Vec<u64> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(op, _)| op.offset)
                .collect()
        }
    }

    #[async_trait]
    impl ChunkTransport for RecordingTransport {
        async fn send(
            &self,
            operation: &UploadOperation,
            body: Vec<u8>,
        ) -> std::result::Result<u16, String> {
            self.sent.lock().unwrap().push((operation.clone(), body));
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(200))
        }
    }
}
