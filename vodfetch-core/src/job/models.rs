use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(JobError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    SingleFile,
    SegmentedPlaylist,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SingleFile => "single_file",
            JobKind::SegmentedPlaylist => "segmented_playlist",
        }
    }

    /// Classify a source URL by its path extension, ignoring query and fragment.
    pub fn infer(source_ref: &str) -> Self {
        let trimmed = source_ref
            .split(['?', '#'])
            .next()
            .unwrap_or(source_ref)
            .trim_end_matches('/');
        if trimmed.to_ascii_lowercase().ends_with(".m3u8") {
            JobKind::SegmentedPlaylist
        } else {
            JobKind::SingleFile
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_file" => Ok(JobKind::SingleFile),
            "segmented_playlist" => Ok(JobKind::SegmentedPlaylist),
            other => Err(JobError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobDraft {
    pub source_ref: String,
    pub kind: JobKind,
}

impl JobDraft {
    pub fn new(source_ref: impl Into<String>, kind: JobKind) -> Self {
        Self {
            source_ref: source_ref.into(),
            kind,
        }
    }

    pub fn inferred(source_ref: impl Into<String>) -> Self {
        let source_ref = source_ref.into();
        let kind = JobKind::infer(&source_ref);
        Self { source_ref, kind }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub source_ref: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub result_ref: Option<String>,
    pub result_size: Option<i64>,
    pub quality: Option<i64>,
    pub failure_reason: Option<String>,
}

impl Job {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: Option<NaiveDateTime> = row.get("created_at")?;
        let updated_at: Option<NaiveDateTime> = row.get("updated_at")?;
        Ok(Self {
            id: row.get("id")?,
            source_ref: row.get("source_ref")?,
            kind: row
                .get::<_, String>("kind")?
                .parse()
                .unwrap_or(JobKind::SingleFile),
            status: row
                .get::<_, String>("status")?
                .parse()
                .unwrap_or(JobStatus::Pending),
            created_at: created_at.map(|dt| Utc.from_utc_datetime(&dt)),
            updated_at: updated_at.map(|dt| Utc.from_utc_datetime(&dt)),
            result_ref: row.get("result_ref")?,
            result_size: row.get("result_size")?,
            quality: row.get("quality")?,
            failure_reason: row.get("failure_reason")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_inferred_from_extension() {
        assert_eq!(
            JobKind::infer("https://h/stream/master.m3u8"),
            JobKind::SegmentedPlaylist
        );
        assert_eq!(
            JobKind::infer("https://h/stream/master.M3U8?token=abc"),
            JobKind::SegmentedPlaylist
        );
        assert_eq!(JobKind::infer("https://h/video.mp4"), JobKind::SingleFile);
        assert_eq!(
            JobKind::infer("https://h/video.mp4#t=10"),
            JobKind::SingleFile
        );
    }

    #[test]
    fn status_round_trips() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("playing".parse::<JobStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Done.terminal());
        assert!(JobStatus::Failed.terminal());
        assert!(!JobStatus::Pending.terminal());
        assert!(!JobStatus::InProgress.terminal());
    }
}
