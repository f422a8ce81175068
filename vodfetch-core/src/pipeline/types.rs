use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-job scratch directory: fetched segments, the assembly manifest, and
/// the output file all live under `<work root>/<job id>/`. Owned exclusively
/// by the single pipeline run processing that job id.
#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
    job_id: String,
}

impl WorkArea {
    pub fn new(work_root: &Path, job_id: &str) -> Self {
        Self {
            root: work_root.join(job_id),
            job_id: job_id.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn segment_path(&self, index: usize, source_url: &str) -> PathBuf {
        let extension = segment_extension(source_url);
        self.root.join(format!("seg_{index:05}.{extension}"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(format!("files_{}.txt", self.job_id))
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(format!("{}.mp4", self.job_id))
    }

    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub async fn remove(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }
}

fn segment_extension(source_url: &str) -> String {
    let path = source_url.split(['?', '#']).next().unwrap_or(source_url);
    path.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(char::is_alphanumeric))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "ts".to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        result_ref: String,
        result_size: i64,
        quality: Option<i64>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub outcome: JobOutcome,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_paths_are_namespaced_and_ordered() {
        let work = WorkArea::new(Path::new("/tmp/work"), "job-abc");
        assert_eq!(
            work.segment_path(0, "https://h/seg.ts?token=1"),
            Path::new("/tmp/work/job-abc/seg_00000.ts")
        );
        assert_eq!(
            work.segment_path(7, "https://h/disguised.png"),
            Path::new("/tmp/work/job-abc/seg_00007.png")
        );
        assert_eq!(
            work.segment_path(3, "https://h/no-extension"),
            Path::new("/tmp/work/job-abc/seg_00003.ts")
        );
        assert_eq!(
            work.manifest_path(),
            Path::new("/tmp/work/job-abc/files_job-abc.txt")
        );
        assert_eq!(
            work.output_path(),
            Path::new("/tmp/work/job-abc/job-abc.mp4")
        );
    }
}
