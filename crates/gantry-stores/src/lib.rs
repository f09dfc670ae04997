//! Asset submission pipeline for App Store Connect
//!
//! This crate gets binary payloads onto App Store Connect and drives the
//! review submission of an app version.
//!
//! ## Components
//!
//! - **Chunk transfer engine**: runs the pre-signed byte-range requests of
//!   an upload reservation
//! - **Asset reservation client**: reserve, transfer, commit with an MD5
//!   checksum, then poll until the remote finishes processing
//! - **Build publish poller**: waits for a newly uploaded build to become
//!   valid, ignoring builds that existed before the upload
//! - **Review submission state machine**: finds or creates a review
//!   submission, attaches the version once and submits or cancels
//! - **Screenshot sets**: pure planning of per-device-set work, executed one
//!   set at a time
//!
//! Every component talks to the remote through [`apple::ApiGateway`] and
//! sits behind a narrow trait ([`AssetUploader`], [`BuildWaiter`],
//! [`ReviewSubmitter`]) so it can be replaced by a fake in tests.
//!
//! ## Usage
//!
//! ```ignore
//! use gantry_stores::apple::AppStoreConnect;
//! use gantry_stores::{Credentials, Platform, PollingConfig, ReviewSubmitter};
//!
//! let credentials = Credentials::from_key_file(key_id, issuer_id, &key_path).await?;
//! let connect = AppStoreConnect::new(credentials, Platform::Ios, PollingConfig::default())?;
//! let report = connect.review_submitter().submit(&app_id, &version_id).await?;
//! ```

pub mod apple;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ApiError, PublishError, Result};
pub use traits::{AssetUploader, BuildWaiter, ReviewSubmitter};
pub use types::*;
