use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailure {
        tool: String,
        status: i32,
        stderr: String,
    },
    #[error("failed to parse tool output: {0}")]
    Parse(String),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// External concatenation step: turn an ordered manifest of local segment
/// files into a single output file.
#[async_trait]
pub trait Concatenator: Send + Sync {
    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()>;
}

pub struct FfmpegConcatenator {
    binary: String,
}

impl FfmpegConcatenator {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()> {
        debug!(manifest = %manifest.display(), output = %output.display(), "concatenating segments");
        let result = Command::new(&self.binary)
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy", "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: self.binary.clone(),
                source,
            })?;
        if !result.status.success() {
            return Err(MediaError::ToolFailure {
                tool: self.binary.clone(),
                status: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub video_height: Option<i64>,
}

/// External media inspection, used only for the non-critical quality update.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}

pub struct FfprobeProber {
    binary: String,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    height: Option<i64>,
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let result = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: self.binary.clone(),
                source,
            })?;
        if !result.status.success() {
            return Err(MediaError::ToolFailure {
                tool: self.binary.clone(),
                status: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        let parsed: ProbeOutput = serde_json::from_slice(&result.stdout)
            .map_err(|err| MediaError::Parse(err.to_string()))?;
        let video_height = parsed
            .streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some("video"))
            .and_then(|stream| stream.height);
        Ok(MediaInfo { video_height })
    }
}
