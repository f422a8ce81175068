use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("job {job_id} not found")]
    NotFound { job_id: String },
    #[error("job {job_id} in unexpected status: {status}")]
    InvalidTransition { job_id: String, status: String },
    #[error("invalid job status: {0}")]
    InvalidStatus(String),
    #[error("invalid job kind: {0}")]
    InvalidKind(String),
    #[error("job store path not configured")]
    MissingStore,
    #[error("failed to open database at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

pub type JobResult<T> = std::result::Result<T, JobError>;
