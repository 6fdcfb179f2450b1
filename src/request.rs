//! # Requests to the automation agent.
//!
//! The agent inside the gateway watches its working directory for two zero-byte
//! flag files: `restart` (soft restart) and `shutdown` (clean exit). It deletes a
//! flag once observed.
//!
//! [`RequestChannel`] hides the mechanism so another transport can replace the
//! files without touching the supervisor.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::SupervisorError;

/// File name of the soft-restart flag.
pub const RESTART_FLAG: &str = "restart";
/// File name of the clean-shutdown flag.
pub const SHUTDOWN_FLAG: &str = "shutdown";

/// Outbound requests to the automation agent.
#[async_trait]
pub trait RequestChannel: Send + Sync + 'static {
    async fn request_restart(&self) -> Result<(), SupervisorError>;

    async fn request_shutdown(&self) -> Result<(), SupervisorError>;
}

/// [`RequestChannel`] writing flag files into a directory.
#[derive(Debug, Clone)]
pub struct FileFlagChannel {
    dir: PathBuf,
}

impl FileFlagChannel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn touch(&self, name: &str) -> Result<(), SupervisorError> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, b"")
            .await
            .map_err(|source| SupervisorError::Io { path: path.clone(), source })?;
        debug!(path = %path.display(), "flag file written");
        Ok(())
    }
}

#[async_trait]
impl RequestChannel for FileFlagChannel {
    async fn request_restart(&self) -> Result<(), SupervisorError> {
        self.touch(RESTART_FLAG).await
    }

    async fn request_shutdown(&self) -> Result<(), SupervisorError> {
        self.touch(SHUTDOWN_FLAG).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_are_zero_byte_files() {
        let dir = tempfile::tempdir().unwrap();
        let ch = FileFlagChannel::new(dir.path());

        ch.request_restart().await.unwrap();
        ch.request_shutdown().await.unwrap();

        for name in [RESTART_FLAG, SHUTDOWN_FLAG] {
            let meta = std::fs::metadata(dir.path().join(name)).unwrap();
            assert_eq!(meta.len(), 0, "{name}");
        }
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ch = FileFlagChannel::new(dir.path().join("gone"));
        let err = ch.request_restart().await.unwrap_err();
        assert_eq!(err.as_label(), "io");
    }
}
