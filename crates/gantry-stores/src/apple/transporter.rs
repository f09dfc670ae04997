//! External binary upload through `xcrun altool`
//!
//! App binaries are not uploaded through the asset API. The upload tool is
//! run as a subprocess and the resulting build is then found with the
//! build poller.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::{PublishError, Result};
use crate::types::{Credentials, Platform};

/// Runs the App Store upload tool for one binary
#[derive(Debug, Clone)]
pub struct TransporterUpload {
    program: String,
    key_id: String,
    issuer_id: String,
    platform: Platform,
    private_keys_dir: Option<PathBuf>,
}

impl TransporterUpload {
    pub fn new(credentials: &Credentials, platform: Platform) -> Self {
        Self {
            program: "xcrun".to_string(),
            key_id: credentials.key_id.clone(),
            issuer_id: credentials.issuer_id.clone(),
            platform,
            private_keys_dir: None,
        }
    }

    /// Directory holding `AuthKey_<key id>.p8`, passed to the tool as `API_PRIVATE_KEYS_DIR`
    pub fn with_private_keys_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.private_keys_dir = Some(dir.into());
        self
    }

    /// Run a different executable instead of `xcrun`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn platform_type(&self) -> &'static str {
        match self.platform {
            Platform::Ios => "ios",
            Platform::MacOs => "macos",
            Platform::TvOs => "appletvos",
            Platform::VisionOs => "visionos",
        }
    }

    fn args(&self, artifact: &Path) -> Vec<String> {
        vec![
            "altool".to_string(),
            "--upload-app".to_string(),
            "-f".to_string(),
            artifact.display().to_string(),
            "--type".to_string(),
            self.platform_type().to_string(),
            "--apiKey".to_string(),
            self.key_id.clone(),
            "--apiIssuer".to_string(),
            self.issuer_id.clone(),
        ]
    }

    /// Upload `artifact`, returning once the tool exits successfully
    #[instrument(skip(self), fields(platform = %self.platform))]
    pub async fn upload(&self, artifact: &Path) -> Result<()> {
        if !artifact.exists() {
            return Err(PublishError::Other(format!(
                "Artifact not found: {}",
                artifact.display()
            )));
        }

        info!("uploading {} via altool", artifact.display());

        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(artifact));
        if let Some(dir) = &self.private_keys_dir {
            cmd.env("API_PRIVATE_KEYS_DIR", dir);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                PublishError::ToolNotFound(self.program.clone())
            } else {
                PublishError::CommandFailed(format!("{} failed to start: {}", self.program, e))
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        debug!("altool stdout: {}", stdout);
        if !stderr.is_empty() {
            debug!("altool stderr: {}", stderr);
        }

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(PublishError::CommandFailed(format!(
                "Upload failed ({}): {}",
                output.status, detail
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn transporter(platform: Platform) -> TransporterUpload {
        TransporterUpload::new(&Credentials::new("KEY123", "issuer-1", "pem"), platform)
    }

    #[test]
    fn test_args() {
        let args = transporter(Platform::TvOs).args(Path::new("/tmp/App.ipa"));
        assert_eq!(
            args,
            vec![
                "altool",
                "--upload-app",
                "-f",
                "/tmp/App.ipa",
                "--type",
                "appletvos",
                "--apiKey",
                "KEY123",
                "--apiIssuer",
                "issuer-1",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let err = transporter(Platform::Ios)
            .upload(Path::new("/definitely/not/here.ipa"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Artifact not found"));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("App.ipa");
        std::fs::write(&artifact, b"ipa").unwrap();

        let err = transporter(Platform::Ios)
            .with_program("definitely-not-a-real-tool-xyz")
            .upload(&artifact)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_is_command_failed() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("App.ipa");
        std::fs::write(&artifact, b"ipa").unwrap();

        let err = transporter(Platform::Ios)
            .with_program("false")
            .upload(&artifact)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::CommandFailed(_)));

        transporter(Platform::Ios)
            .with_program("true")
            .upload(&artifact)
            .await
            .unwrap();
    }
}
