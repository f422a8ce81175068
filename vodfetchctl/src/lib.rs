use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use vodfetch_core::{
    load_config, FfmpegConcatenator, FfprobeProber, Job, JobDraft, JobKind, JobStatus,
    OutboxPublisher, PipelineController, SchedulerLoop, SqliteJobStore, VodfetchConfig,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vodfetch_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("job store error: {0}")]
    Store(#[from] vodfetch_core::JobError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] vodfetch_core::PipelineError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "vodfetch acquisition daemon control interface", long_about = None)]
pub struct Cli {
    /// Path to the main vodfetch.toml
    #[arg(long, default_value = "configs/vodfetch.toml")]
    pub config: PathBuf,
    /// Alternative path for jobs.sqlite
    #[arg(long)]
    pub jobs_db: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the recovery sweep and then the acquisition loop
    Run,
    /// Job queue operations
    #[command(subcommand)]
    Job(JobCommands),
    /// Reset stale in-progress jobs and clear their work areas
    Recover,
    /// Show per-status job counts
    Status,
}

#[derive(Subcommand, Debug)]
pub enum JobCommands {
    /// Enqueue a new acquisition job
    Add(JobAddArgs),
    /// List jobs in the store
    List(JobListArgs),
    /// Re-enqueue a failed job
    Retry(JobRetryArgs),
}

#[derive(Args, Debug)]
pub struct JobAddArgs {
    /// Remote resource URL
    pub url: String,
    /// Override the kind inferred from the URL
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,
}

#[derive(Args, Debug)]
pub struct JobListArgs {
    /// Filter by status
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    /// Maximum records returned
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct JobRetryArgs {
    pub id: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    SingleFile,
    SegmentedPlaylist,
}

impl From<KindArg> for JobKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::SingleFile => JobKind::SingleFile,
            KindArg::SegmentedPlaylist => JobKind::SegmentedPlaylist,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl From<StatusArg> for JobStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => JobStatus::Pending,
            StatusArg::InProgress => JobStatus::InProgress,
            StatusArg::Done => JobStatus::Done,
            StatusArg::Failed => JobStatus::Failed,
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let config = load_config(&cli.config)?;
    let store = open_store(&cli, &config)?;
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Run => {
            let controller = build_controller(store, &config)?;
            let scheduler = SchedulerLoop::new(controller, config.scheduler.poll_interval());
            runtime.block_on(scheduler.run())?;
            Ok(())
        }
        Commands::Job(JobCommands::Add(args)) => {
            let job = add_job(&store, &args.url, args.kind.map(JobKind::from))?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{} {} {}", job.id, job.kind, job.source_ref);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&job)?),
            }
            Ok(())
        }
        Commands::Job(JobCommands::List(args)) => {
            let jobs = store.list(args.status.map(JobStatus::from), args.limit)?;
            print_jobs(&jobs, cli.format)?;
            Ok(())
        }
        Commands::Job(JobCommands::Retry(args)) => {
            store.retry(&args.id)?;
            println!("{} pending", args.id);
            Ok(())
        }
        Commands::Recover => {
            let controller = build_controller(store, &config)?;
            let recovered = runtime.block_on(controller.recover_stale_jobs())?;
            println!("{recovered} stale job(s) reset");
            Ok(())
        }
        Commands::Status => {
            let counts = store.count_by_status()?;
            match cli.format {
                OutputFormat::Text => {
                    for status in ["pending", "in_progress", "done", "failed"] {
                        println!("{status:>12}  {}", counts.get(status).copied().unwrap_or(0));
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
            }
            Ok(())
        }
    }
}

fn open_store(cli: &Cli, config: &VodfetchConfig) -> Result<SqliteJobStore> {
    let db_path = cli
        .jobs_db
        .clone()
        .unwrap_or_else(|| config.jobs_db_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteJobStore::builder().path(&db_path).build()?;
    store.initialize()?;
    Ok(store)
}

fn build_controller(store: SqliteJobStore, config: &VodfetchConfig) -> Result<PipelineController> {
    let concatenator = Arc::new(FfmpegConcatenator::new(&config.tools.ffmpeg));
    let prober = Arc::new(FfprobeProber::new(&config.tools.ffprobe));
    let publisher = Arc::new(OutboxPublisher::new(config.outbox_dir()));
    Ok(PipelineController::new(
        store,
        config,
        concatenator,
        prober,
        publisher,
    )?)
}

fn add_job(store: &SqliteJobStore, url: &str, kind: Option<JobKind>) -> Result<Job> {
    let draft = match kind {
        Some(kind) => JobDraft::new(url, kind),
        None => JobDraft::inferred(url),
    };
    Ok(store.create(&draft)?)
}

fn print_jobs(jobs: &[Job], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for job in jobs {
                let created = job
                    .created_at
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<11}  {:<18}  {}  {}",
                    job.id, job.status, job.kind, created, job.source_ref
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(jobs)?),
    }
    Ok(())
}
