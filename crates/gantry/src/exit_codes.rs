//! Exit codes for the CLI

use gantry_core::{ConfigError, GantryError};
use gantry_stores::PublishError;

/// General error
pub const ERROR: i32 = 1;

/// Configuration or credentials error
pub const CONFIG_ERROR: i32 = 2;

/// The remote API rejected a request
pub const API_ERROR: i32 = 3;

/// The remote rejected an uploaded asset or build
pub const PROCESSING_FAILED: i32 = 4;

/// A poll ran out of attempts or time
pub const TIMEOUT: i32 = 5;

fn for_publish_error(err: &PublishError) -> i32 {
    match err {
        PublishError::InvalidCredentials(_) | PublishError::ConfigurationError(_) => CONFIG_ERROR,
        PublishError::ProcessingFailed { .. } | PublishError::BuildProcessingFailed { .. } => {
            PROCESSING_FAILED
        }
        PublishError::Timeout(_) => TIMEOUT,
        _ if err.api_error().is_some() => API_ERROR,
        _ => ERROR,
    }
}

/// Exit code for a failed command
pub fn for_error(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<PublishError>() {
        return for_publish_error(err);
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_ERROR;
    }
    match err.downcast_ref::<GantryError>() {
        Some(GantryError::Config(_)) => CONFIG_ERROR,
        Some(GantryError::Publish(e)) => for_publish_error(e),
        _ => ERROR,
    }
}
