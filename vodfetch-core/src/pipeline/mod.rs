mod error;
mod types;

pub use error::{PipelineError, PipelineResult};
pub use types::{JobOutcome, JobReport, WorkArea};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::assemble::Assembler;
use crate::config::VodfetchConfig;
use crate::download::{self, RetryPolicy, SegmentFetcher};
use crate::job::{Job, JobKind, SqliteJobStore};
use crate::media::{Concatenator, Prober};
use crate::playlist::PlaylistResolver;
use crate::publish::Publisher;

/// Orchestrates one job end-to-end: claim, resolve/fetch/assemble (or direct
/// single-file fetch), probe, publish, finalize. Also owns the startup
/// recovery sweep.
pub struct PipelineController {
    job_store: SqliteJobStore,
    fetcher: SegmentFetcher,
    resolver: PlaylistResolver,
    assembler: Assembler,
    prober: Arc<dyn Prober>,
    publisher: Arc<dyn Publisher>,
    retry_policy: RetryPolicy,
    work_root: PathBuf,
    log_path: PathBuf,
    segment_concurrency: usize,
    single_file_timeout: Duration,
}

impl PipelineController {
    pub fn new(
        job_store: SqliteJobStore,
        config: &VodfetchConfig,
        concatenator: Arc<dyn Concatenator>,
        prober: Arc<dyn Prober>,
        publisher: Arc<dyn Publisher>,
    ) -> PipelineResult<Self> {
        let fetcher = SegmentFetcher::new(&config.download)?;
        let resolver = PlaylistResolver::new(fetcher.clone());
        let assembler = Assembler::new(concatenator);
        let log_path = config
            .resolve_path(&config.paths.logs_dir)
            .join("pipeline_failures.log");
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            job_store,
            fetcher,
            resolver,
            assembler,
            prober,
            publisher,
            retry_policy: RetryPolicy::from(&config.download),
            work_root: config.work_root(),
            log_path,
            segment_concurrency: config.download.segment_concurrency.max(1),
            single_file_timeout: config.download.single_file_timeout(),
        })
    }

    pub fn job_store(&self) -> &SqliteJobStore {
        &self.job_store
    }

    /// Claim and process a single job. `Ok(None)` means nothing was eligible.
    /// A processed job always ends in a committed `done` or `failed` status;
    /// errors on the failure path itself (store unreachable) propagate.
    pub async fn run_once(&self) -> PipelineResult<Option<JobReport>> {
        let Some(job) = self.job_store.claim_next()? else {
            return Ok(None);
        };
        info!(job = %job.id, source = %job.source_ref, kind = %job.kind, "claimed job");
        let work = WorkArea::new(&self.work_root, &job.id);
        match self.process(&job, &work).await {
            Ok(report) => Ok(Some(report)),
            Err(err) => {
                error!(job = %job.id, error = %err, "job failed");
                self.log_failure(&job.id, &err);
                if let Err(cleanup_err) = work.remove().await {
                    warn!(job = %job.id, error = %cleanup_err, "failed to remove work area");
                }
                self.job_store.mark_failed(&job.id, &err.to_string())?;
                Ok(Some(JobReport {
                    job_id: job.id.clone(),
                    outcome: JobOutcome::Failed {
                        reason: err.to_string(),
                    },
                    finished_at: Utc::now(),
                }))
            }
        }
    }

    /// Reset every in-progress job back to pending and wipe its work area.
    /// Runs once at process start; an in-progress job at that point can only
    /// be the residue of a crash. Partial output is never inspected.
    pub async fn recover_stale_jobs(&self) -> PipelineResult<usize> {
        let stale = self.job_store.list_in_progress()?;
        for job in &stale {
            let work = WorkArea::new(&self.work_root, &job.id);
            work.remove().await.map_err(|source| PipelineError::Io {
                path: work.root().to_path_buf(),
                source,
            })?;
            self.job_store.release(&job.id)?;
            warn!(job = %job.id, "reset stale in-progress job for retry");
        }
        Ok(stale.len())
    }

    async fn process(&self, job: &Job, work: &WorkArea) -> PipelineResult<JobReport> {
        work.ensure().await.map_err(|source| PipelineError::Io {
            path: work.root().to_path_buf(),
            source,
        })?;

        let assembled = match job.kind {
            JobKind::SegmentedPlaylist => self.acquire_playlist(job, work).await?,
            JobKind::SingleFile => self.acquire_single(job, work).await?,
        };

        let quality = self.observe_quality(job, &assembled).await;
        let receipt = self.publisher.publish(&assembled, job).await?;

        if let Err(err) = work.remove().await {
            warn!(job = %job.id, error = %err, "failed to clean work area");
        }
        self.job_store
            .mark_done(&job.id, &receipt.remote_ref, receipt.size)?;
        info!(
            job = %job.id,
            result = %receipt.remote_ref,
            size = receipt.size,
            "job complete"
        );
        Ok(JobReport {
            job_id: job.id.clone(),
            outcome: JobOutcome::Completed {
                result_ref: receipt.remote_ref,
                result_size: receipt.size,
                quality,
            },
            finished_at: Utc::now(),
        })
    }

    async fn acquire_playlist(&self, job: &Job, work: &WorkArea) -> PipelineResult<PathBuf> {
        let segments = self.resolver.resolve(&job.source_ref).await?;
        info!(job = %job.id, segments = segments.len(), "resolved playlist");

        let fetcher = &self.fetcher;
        let policy = &self.retry_policy;
        let outcomes = download::run_all(&segments, self.segment_concurrency, |segment| {
            let destination = work.segment_path(segment.index, &segment.url);
            async move {
                fetcher
                    .fetch_to_file(&segment.url, &destination, policy)
                    .await
            }
        })
        .await;

        // Every segment must arrive before assembly; a partially fetched
        // stream is a failed job, not a shorter video.
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            return Err(PipelineError::SegmentsIncomplete {
                failed,
                total: outcomes.len(),
            });
        }

        let segment_files: Vec<PathBuf> = segments
            .iter()
            .map(|segment| work.segment_path(segment.index, &segment.url))
            .collect();
        Ok(self.assembler.assemble(work, &segment_files).await?)
    }

    async fn acquire_single(&self, job: &Job, work: &WorkArea) -> PipelineResult<PathBuf> {
        let output = work.output_path();
        let bytes = self
            .fetcher
            .fetch_to_file_with_timeout(
                &job.source_ref,
                &output,
                &self.retry_policy,
                self.single_file_timeout,
            )
            .await?;
        info!(job = %job.id, bytes, "single-file fetch complete");
        Ok(output)
    }

    /// Record the assembled file's video height. Awaited before publish so
    /// the quality column is settled by the time the job finishes; failures
    /// here never affect the job outcome.
    async fn observe_quality(&self, job: &Job, path: &Path) -> Option<i64> {
        match self.prober.probe(path).await {
            Ok(info) => match info.video_height {
                Some(height) => {
                    info!(job = %job.id, height, "observed video quality");
                    if let Err(err) = self.job_store.mark_quality_observed(&job.id, height) {
                        warn!(job = %job.id, error = %err, "failed to record quality");
                    }
                    Some(height)
                }
                None => {
                    warn!(job = %job.id, "no video stream found in assembled file");
                    None
                }
            },
            Err(err) => {
                warn!(job = %job.id, error = %err, "quality probe failed");
                None
            }
        }
    }

    fn log_failure(&self, job_id: &str, error: &PipelineError) {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
        {
            let _ = writeln!(file, "{} [{}] {}", Utc::now().to_rfc3339(), job_id, error);
        }
    }
}
