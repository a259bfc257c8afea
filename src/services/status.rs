//! Health signal for the dashboard: a small JSON document overwritten on every
//! state change. Readers poll the file; nothing here reads it back.

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Latest logger state. Exactly one detail field is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub running: bool,
    #[serde(flatten)]
    pub detail: StatusDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusDetail {
    Message(String),
    Warning(String),
    Error(String),
}

impl Status {
    pub fn message(running: bool, text: impl Into<String>) -> Self {
        Self {
            running,
            detail: StatusDetail::Message(text.into()),
        }
    }

    pub fn warning(running: bool, text: impl Into<String>) -> Self {
        Self {
            running,
            detail: StatusDetail::Warning(text.into()),
        }
    }

    pub fn error(running: bool, text: impl Into<String>) -> Self {
        Self {
            running,
            detail: StatusDetail::Error(text.into()),
        }
    }

    pub fn started() -> Self {
        Self::message(true, "Logger started")
    }

    pub fn stopped() -> Self {
        Self::message(false, "Logger stopped")
    }

    pub fn last_update(timestamp: &str) -> Self {
        Self::message(true, format!("Last update: {}", timestamp))
    }
}

/// Last-write-wins sink for [`Status`].
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Replace the visible status. Never fails the caller.
    async fn publish(&self, status: &Status);
}

#[async_trait]
impl<T: StatusSink + ?Sized> StatusSink for Arc<T> {
    async fn publish(&self, status: &Status) {
        (**self).publish(status).await
    }
}

/// Status document on disk, replaced atomically by write-then-rename.
pub struct StatusFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl StatusFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut tmp_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "status.json".into());
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        Self { path, tmp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, status: &Status) -> std::io::Result<()> {
        let content = serde_json::to_vec_pretty(status)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Same directory as the target, so the rename cannot cross filesystems.
        tokio::fs::write(&self.tmp_path, content).await?;
        tokio::fs::rename(&self.tmp_path, &self.path).await
    }
}

#[async_trait]
impl StatusSink for StatusFile {
    async fn publish(&self, status: &Status) {
        match self.write(status).await {
            Ok(()) => debug!("📝 Status updated: {:?}", status),
            Err(e) => error!("❌ Error writing status to {}: {}", self.path.display(), e),
        }
    }
}
