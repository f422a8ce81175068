use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VodfetchConfig {
    pub system: SystemSection,
    pub paths: PathsSection,
    pub download: DownloadSection,
    pub tools: ToolsSection,
    pub scheduler: SchedulerSection,
}

impl VodfetchConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    pub fn jobs_db_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.data_dir).join("jobs.sqlite")
    }

    pub fn work_root(&self) -> PathBuf {
        self.resolve_path(&self.paths.work_dir)
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.outbox_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemSection {
    pub node_name: String,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub data_dir: String,
    pub work_dir: String,
    pub outbox_dir: String,
    pub logs_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSection {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub segment_concurrency: usize,
    pub single_file_timeout_secs: u64,
    pub referer: Option<String>,
}

impl DownloadSection {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn single_file_timeout(&self) -> Duration {
        Duration::from_secs(self.single_file_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    pub ffmpeg: String,
    pub ffprobe: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    pub poll_interval_secs: u64,
}

impl SchedulerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<VodfetchConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
