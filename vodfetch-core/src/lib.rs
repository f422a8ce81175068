pub mod assemble;
pub mod config;
pub mod download;
pub mod error;
pub mod job;
pub mod media;
pub mod pipeline;
pub mod playlist;
pub mod publish;
pub mod scheduler;
pub mod sqlite;

pub use assemble::{AssembleError, AssembleResult, Assembler};
pub use config::{
    load_config, DownloadSection, PathsSection, SchedulerSection, SystemSection, ToolsSection,
    VodfetchConfig,
};
pub use download::{
    run_all, FetchError, FetchResult, RetryPolicy, Segment, SegmentFetcher, SegmentOutcome,
};
pub use error::{ConfigError, Result};
pub use job::{
    Job, JobDraft, JobError, JobKind, JobResult, JobStatus, SqliteJobStore, SqliteJobStoreBuilder,
};
pub use media::{
    Concatenator, FfmpegConcatenator, FfprobeProber, MediaError, MediaInfo, MediaResult, Prober,
};
pub use pipeline::{
    JobOutcome, JobReport, PipelineController, PipelineError, PipelineResult, WorkArea,
};
pub use playlist::{PlaylistResolver, ResolveError, ResolveResult};
pub use publish::{OutboxPublisher, PublishError, PublishReceipt, PublishResult, Publisher};
pub use scheduler::SchedulerLoop;
