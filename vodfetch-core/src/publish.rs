use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::job::Job;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("publish rejected: {0}")]
    Rejected(String),
}

pub type PublishResult<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub remote_ref: String,
    pub size: i64,
}

/// Downstream hand-off for the assembled file. Storage-provider uploads and
/// their auth flows live behind this seam.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, path: &Path, job: &Job) -> PublishResult<PublishReceipt>;
}

/// Moves the assembled file into a local outbox directory and reports the
/// destination as the remote reference.
pub struct OutboxPublisher {
    outbox_dir: PathBuf,
}

impl OutboxPublisher {
    pub fn new(outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
        }
    }
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn publish(&self, path: &Path, job: &Job) -> PublishResult<PublishReceipt> {
        fs::create_dir_all(&self.outbox_dir)
            .await
            .map_err(|source| PublishError::Io {
                path: self.outbox_dir.clone(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| format!("{}.mp4", job.id).into());
        let destination = self.outbox_dir.join(&file_name);
        let metadata = fs::metadata(path).await.map_err(|source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let size = metadata.len() as i64;

        // Rename when the outbox shares a filesystem with the work area,
        // otherwise fall back to copy and remove.
        if fs::rename(path, &destination).await.is_err() {
            fs::copy(path, &destination)
                .await
                .map_err(|source| PublishError::Io {
                    path: destination.clone(),
                    source,
                })?;
            fs::remove_file(path)
                .await
                .map_err(|source| PublishError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        debug!(job = %job.id, destination = %destination.display(), size, "published to outbox");
        Ok(PublishReceipt {
            remote_ref: destination.to_string_lossy().to_string(),
            size,
        })
    }
}
