//! Store error types

use std::fmt;
use thiserror::Error;

/// Error reported by the App Store Connect API for a non-2xx response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Short title of the first remote error (or the HTTP reason phrase)
    pub title: String,

    /// HTTP status code
    pub status: u16,

    /// Detail lines, one per remote error
    pub details: Vec<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(title: impl Into<String>, status: u16, details: Vec<String>) -> Self {
        Self {
            title: title.into(),
            status,
            details,
        }
    }

    /// Whether the remote rejected the request because the resource already exists
    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    /// Whether the remote reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.status, self.title)?;
        if !self.details.is_empty() {
            write!(f, ": {}", self.details.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Publishing pipeline errors
#[derive(Debug, Error)]
pub enum PublishError {
    /// The remote refused to create the asset record
    #[error("Failed to reserve upload for {file_name}: {source}")]
    ReservationFailed {
        file_name: String,
        #[source]
        source: Box<PublishError>,
    },

    /// A pre-signed chunk request failed or returned a non-2xx status
    #[error("Transfer failed for {file_name}: {detail}")]
    TransferFailed { file_name: String, detail: String },

    /// The remote refused the commit (checksum + uploaded flag)
    #[error("Failed to commit upload for {file_name}: {source}")]
    CommitFailed {
        file_name: String,
        #[source]
        source: Box<PublishError>,
    },

    /// The remote declared the asset invalid after processing
    #[error("Processing failed for {file_name}: {details}")]
    ProcessingFailed { file_name: String, details: String },

    /// A build reached a terminal state other than valid
    #[error("Build {build_id} finished processing as {state}")]
    BuildProcessingFailed { build_id: String, state: String },

    /// The remote never reached a terminal state in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// No review submission matched the request
    #[error("Review submission not found: {0}")]
    SubmissionNotFound(String),

    /// API error from the store
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Invalid credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Tool not found
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// Command execution failed
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PublishError {
    /// The API error behind this failure, looking through reservation and commit wrappers
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            PublishError::Api(e) => Some(e),
            PublishError::ReservationFailed { source, .. }
            | PublishError::CommitFailed { source, .. } => source.api_error(),
            _ => None,
        }
    }

    /// Whether this is a 409 conflict from the remote
    pub fn is_conflict(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_conflict)
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::new(
            "The provided entity includes an attribute with an invalid value",
            409,
            vec!["fileSize is too large".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "409 - The provided entity includes an attribute with an invalid value: fileSize is too large"
        );
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_conflict_seen_through_wrappers() {
        let err = PublishError::ReservationFailed {
            file_name: "shot1.png".to_string(),
            source: Box::new(PublishError::Api(ApiError::new("Conflict", 409, vec![]))),
        };
        assert!(err.is_conflict());
        assert_eq!(err.api_error().map(|e| e.status), Some(409));

        let err = PublishError::Timeout("shot1.png".to_string());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "Operation timed out: shot1.png");
    }

    #[test]
    fn test_processing_failed_message() {
        let err = PublishError::ProcessingFailed {
            file_name: "shot1.png".to_string(),
            details: "[400] bad image".to_string(),
        };
        assert_eq!(err.to_string(), "Processing failed for shot1.png: [400] bad image");
    }
}
