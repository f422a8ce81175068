pub mod error;
pub mod models;
pub mod store;

pub use error::{JobError, JobResult};
pub use models::{Job, JobDraft, JobKind, JobStatus};
pub use store::{SqliteJobStore, SqliteJobStoreBuilder};
