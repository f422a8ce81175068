use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::media::{Concatenator, MediaError};
use crate::pipeline::WorkArea;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("concatenation failed: {0}")]
    ConcatFailed(#[from] MediaError),
    #[error("no segment files to assemble")]
    Empty,
}

pub type AssembleResult<T> = std::result::Result<T, AssembleError>;

/// Concatenates fetched segments into one output file, in the order the
/// playlist enumerated them, never in download-completion order.
pub struct Assembler {
    concatenator: Arc<dyn Concatenator>,
}

impl Assembler {
    pub fn new(concatenator: Arc<dyn Concatenator>) -> Self {
        Self { concatenator }
    }

    pub async fn assemble(
        &self,
        work: &WorkArea,
        segment_files: &[PathBuf],
    ) -> AssembleResult<PathBuf> {
        if segment_files.is_empty() {
            return Err(AssembleError::Empty);
        }

        let manifest = work.manifest_path();
        let mut listing = String::new();
        for path in segment_files {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());
            listing.push_str(&format!("file '{name}'\n"));
        }
        fs::write(&manifest, listing)
            .await
            .map_err(|source| AssembleError::Io {
                path: manifest.clone(),
                source,
            })?;

        let output = work.output_path();
        // On failure the manifest and any partial output stay behind for
        // diagnosis; only total success cleans the scratch files.
        self.concatenator.concat(&manifest, &output).await?;

        fs::remove_file(&manifest)
            .await
            .map_err(|source| AssembleError::Io {
                path: manifest.clone(),
                source,
            })?;
        for path in segment_files {
            fs::remove_file(path)
                .await
                .map_err(|source| AssembleError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        debug!(
            output = %output.display(),
            segments = segment_files.len(),
            "assembly complete"
        );
        Ok(output)
    }
}
