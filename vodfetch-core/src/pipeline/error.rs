use std::path::PathBuf;

use thiserror::Error;

use crate::assemble::AssembleError;
use crate::download::FetchError;
use crate::job::JobError;
use crate::playlist::ResolveError;
use crate::publish::PublishError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job store error: {0}")]
    Store(#[from] JobError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("playlist resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("assembly failed: {0}")]
    Assemble(#[from] AssembleError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("{failed} of {total} segments failed to download")]
    SegmentsIncomplete { failed: usize, total: usize },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
