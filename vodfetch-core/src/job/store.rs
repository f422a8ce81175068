use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use uuid::Uuid;

use crate::sqlite::configure_connection;

use super::models::{Job, JobDraft, JobStatus};
use super::{JobError, JobResult};

const JOB_SCHEMA: &str = include_str!("../../sql/jobs.sql");

#[derive(Debug, Clone)]
pub struct SqliteJobStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteJobStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteJobStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> JobResult<SqliteJobStore> {
        let path = self.path.ok_or(JobError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteJobStore { path, flags })
    }
}

/// Durable record of acquisition jobs; the single source of truth for what
/// work exists and its lifecycle state.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteJobStore {
    pub fn builder() -> SqliteJobStoreBuilder {
        SqliteJobStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> JobResult<Self> {
        SqliteJobStoreBuilder::new().path(path).build()
    }

    fn open(&self) -> JobResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            JobError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| JobError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> JobResult<()> {
        let conn = self.open()?;
        conn.execute_batch(JOB_SCHEMA)?;
        Ok(())
    }

    pub fn create(&self, draft: &JobDraft) -> JobResult<Job> {
        let conn = self.open()?;
        let id = format!("job-{}", Uuid::new_v4().simple());
        conn.execute(
            "INSERT INTO jobs (id, source_ref, kind, status) VALUES (?1, ?2, ?3, 'pending')",
            params![&id, &draft.source_ref, draft.kind.as_str()],
        )?;
        self.fetch_by_id(&id)?.ok_or(JobError::NotFound { job_id: id })
    }

    pub fn fetch_by_id(&self, job_id: &str) -> JobResult<Option<Job>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let job = stmt
            .query_row([job_id], |row| Job::from_row(row))
            .optional()?;
        Ok(job)
    }

    pub fn list(&self, status: Option<JobStatus>, limit: usize) -> JobResult<Vec<Job>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, id ASC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(
                (status.as_ref().map(JobStatus::as_str), limit as i64),
                |row| Job::from_row(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_pending(&self) -> JobResult<Vec<Job>> {
        self.list_by_status(JobStatus::Pending)
    }

    pub fn list_in_progress(&self) -> JobResult<Vec<Job>> {
        self.list_by_status(JobStatus::InProgress)
    }

    fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC, id ASC",
        )?;
        let rows = stmt
            .query_map([status.as_str()], |row| Job::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Atomically claim the newest pending job, ties broken by lowest id.
    /// Returns `None` while another job is still in progress: the pipeline
    /// is single-flight and a restart race must not double-claim.
    pub fn claim_next(&self) -> JobResult<Option<Job>> {
        let conn = self.open()?;
        conn.execute("BEGIN IMMEDIATE TRANSACTION", [])?;
        let in_flight: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = 'in_progress'",
            [],
            |row| row.get(0),
        )?;
        if in_flight > 0 {
            conn.execute("ROLLBACK", [])?;
            return Ok(None);
        }
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs
             WHERE status = 'pending'
             ORDER BY created_at DESC, id ASC
             LIMIT 1",
        )?;
        let job_opt = stmt.query_row([], |row| Job::from_row(row)).optional()?;
        if let Some(job) = job_opt {
            let affected = conn.execute(
                "UPDATE jobs SET status = 'in_progress', updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1 AND status = 'pending'",
                [job.id.as_str()],
            )?;
            if affected == 1 {
                conn.execute("COMMIT", [])?;
                return self.fetch_by_id(&job.id);
            }
        }
        conn.execute("ROLLBACK", [])?;
        Ok(None)
    }

    pub fn mark_done(&self, job_id: &str, result_ref: &str, result_size: i64) -> JobResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE jobs
             SET status = 'done', result_ref = ?2, result_size = ?3,
                 failure_reason = NULL, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND status = 'in_progress'",
            params![job_id, result_ref, result_size],
        )?;
        self.ensure_transitioned(&conn, affected, job_id)
    }

    pub fn mark_failed(&self, job_id: &str, reason: &str) -> JobResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE jobs
             SET status = 'failed', failure_reason = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND status = 'in_progress'",
            params![job_id, reason],
        )?;
        self.ensure_transitioned(&conn, affected, job_id)
    }

    /// Record the observed video height without touching lifecycle status.
    pub fn mark_quality_observed(&self, job_id: &str, height: i64) -> JobResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE jobs SET quality = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![job_id, height],
        )?;
        if affected == 0 {
            return Err(JobError::NotFound {
                job_id: job_id.to_string(),
            });
        }
        Ok(())
    }

    /// Manual re-enqueue of a failed job. The daemon never does this on its
    /// own; failed is terminal until an operator intervenes.
    pub fn retry(&self, job_id: &str) -> JobResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE jobs
             SET status = 'pending', failure_reason = NULL, result_ref = NULL,
                 result_size = NULL, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND status = 'failed'",
            [job_id],
        )?;
        self.ensure_transitioned(&conn, affected, job_id)
    }

    /// Recovery path: put a crashed in-progress job back in line.
    pub fn release(&self, job_id: &str) -> JobResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE jobs
             SET status = 'pending', updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND status = 'in_progress'",
            [job_id],
        )?;
        self.ensure_transitioned(&conn, affected, job_id)
    }

    pub fn count_by_status(&self) -> JobResult<HashMap<String, usize>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let mut map = HashMap::new();
        for row in stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })? {
            let (status, count) = row?;
            map.insert(status, count as usize);
        }
        Ok(map)
    }

    fn ensure_transitioned(
        &self,
        conn: &Connection,
        affected: usize,
        job_id: &str,
    ) -> JobResult<()> {
        if affected == 1 {
            return Ok(());
        }
        let status: Option<String> = conn
            .query_row("SELECT status FROM jobs WHERE id = ?1", [job_id], |row| {
                row.get(0)
            })
            .optional()?;
        match status {
            Some(status) => Err(JobError::InvalidTransition {
                job_id: job_id.to_string(),
                status,
            }),
            None => Err(JobError::NotFound {
                job_id: job_id.to_string(),
            }),
        }
    }
}
