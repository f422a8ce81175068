use std::path::Path;

use rusqlite::Connection;
use tempfile::TempDir;

use vodfetch_core::{JobDraft, JobError, JobKind, JobStatus, SqliteJobStore};

fn temp_store(dir: &Path) -> (SqliteJobStore, std::path::PathBuf) {
    let path = dir.join("jobs.sqlite");
    let store = SqliteJobStore::builder()
        .path(&path)
        .create_if_missing(true)
        .build()
        .expect("create store");
    store.initialize().expect("initialize store");
    (store, path)
}

fn set_created_at(db_path: &Path, job_id: &str, timestamp: &str) {
    let conn = Connection::open(db_path).unwrap();
    conn.execute(
        "UPDATE jobs SET created_at = ?2 WHERE id = ?1",
        [job_id, timestamp],
    )
    .unwrap();
}

#[test]
fn create_assigns_id_and_pending_status() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    let draft = JobDraft::inferred("https://h/stream/master.m3u8");
    let job = store.create(&draft).unwrap();
    assert!(job.id.starts_with("job-"));
    assert_eq!(job.kind, JobKind::SegmentedPlaylist);
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.created_at.is_some());
    assert!(job.result_ref.is_none());

    let pending = store.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, job.id);
}

#[test]
fn claim_prefers_newest_created_at() {
    let dir = TempDir::new().unwrap();
    let (store, db_path) = temp_store(dir.path());

    let older = store
        .create(&JobDraft::new("https://h/old.mp4", JobKind::SingleFile))
        .unwrap();
    let newer = store
        .create(&JobDraft::new("https://h/new.mp4", JobKind::SingleFile))
        .unwrap();
    set_created_at(&db_path, &older.id, "2026-01-01 10:00:00");
    set_created_at(&db_path, &newer.id, "2026-01-02 10:00:00");

    let claimed = store.claim_next().unwrap().expect("expected a claim");
    assert_eq!(claimed.id, newer.id);
    assert_eq!(claimed.status, JobStatus::InProgress);
}

#[test]
fn claim_ties_break_on_lowest_id() {
    let dir = TempDir::new().unwrap();
    let (store, db_path) = temp_store(dir.path());

    let a = store
        .create(&JobDraft::new("https://h/a.mp4", JobKind::SingleFile))
        .unwrap();
    let b = store
        .create(&JobDraft::new("https://h/b.mp4", JobKind::SingleFile))
        .unwrap();
    set_created_at(&db_path, &a.id, "2026-01-01 10:00:00");
    set_created_at(&db_path, &b.id, "2026-01-01 10:00:00");

    let expected = if a.id < b.id { &a.id } else { &b.id };
    let claimed = store.claim_next().unwrap().expect("expected a claim");
    assert_eq!(&claimed.id, expected);
}

#[test]
fn claim_refuses_while_another_job_in_progress() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    store
        .create(&JobDraft::new("https://h/a.mp4", JobKind::SingleFile))
        .unwrap();
    store
        .create(&JobDraft::new("https://h/b.mp4", JobKind::SingleFile))
        .unwrap();

    let first = store.claim_next().unwrap().expect("first claim");
    assert!(store.claim_next().unwrap().is_none());

    store.mark_done(&first.id, "file:///outbox/a.mp4", 10).unwrap();
    let second = store.claim_next().unwrap().expect("second claim");
    assert_ne!(first.id, second.id);
}

#[test]
fn overlapping_claims_never_hand_out_the_same_job() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());
    for n in 0..4 {
        store
            .create(&JobDraft::new(
                format!("https://h/{n}.mp4"),
                JobKind::SingleFile,
            ))
            .unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || store.claim_next().unwrap())
        })
        .collect();
    let claimed: Vec<_> = handles
        .into_iter()
        .filter_map(|handle| handle.join().unwrap())
        .collect();

    // The single-flight guard means exactly one claim can win.
    assert_eq!(claimed.len(), 1);
}

#[test]
fn done_and_failed_transitions_are_guarded() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    let job = store
        .create(&JobDraft::new("https://h/a.mp4", JobKind::SingleFile))
        .unwrap();

    // Completion is only legal from in_progress.
    let err = store
        .mark_done(&job.id, "file:///outbox/a.mp4", 10)
        .unwrap_err();
    assert!(matches!(err, JobError::InvalidTransition { .. }));

    let claimed = store.claim_next().unwrap().unwrap();
    store
        .mark_done(&claimed.id, "file:///outbox/a.mp4", 10)
        .unwrap();
    let stored = store.fetch_by_id(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Done);
    assert_eq!(stored.result_ref.as_deref(), Some("file:///outbox/a.mp4"));
    assert_eq!(stored.result_size, Some(10));

    let err = store.mark_failed(&job.id, "late failure").unwrap_err();
    assert!(matches!(err, JobError::InvalidTransition { .. }));
}

#[test]
fn failed_jobs_retry_manually() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    let job = store
        .create(&JobDraft::new("https://h/a.m3u8", JobKind::SegmentedPlaylist))
        .unwrap();
    let claimed = store.claim_next().unwrap().unwrap();
    store
        .mark_failed(&claimed.id, "no segment entries found")
        .unwrap();

    let stored = store.fetch_by_id(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(
        stored.failure_reason.as_deref(),
        Some("no segment entries found")
    );

    store.retry(&job.id).unwrap();
    let stored = store.fetch_by_id(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert!(stored.failure_reason.is_none());

    // A pending job cannot be retried again.
    assert!(matches!(
        store.retry(&job.id),
        Err(JobError::InvalidTransition { .. })
    ));
}

#[test]
fn quality_update_leaves_status_untouched() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    let job = store
        .create(&JobDraft::new("https://h/a.mp4", JobKind::SingleFile))
        .unwrap();
    let claimed = store.claim_next().unwrap().unwrap();
    store.mark_quality_observed(&claimed.id, 720).unwrap();

    let stored = store.fetch_by_id(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::InProgress);
    assert_eq!(stored.quality, Some(720));
}

#[test]
fn release_returns_stale_jobs_to_pending() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    let job = store
        .create(&JobDraft::new("https://h/a.mp4", JobKind::SingleFile))
        .unwrap();
    store.claim_next().unwrap().unwrap();

    let stale = store.list_in_progress().unwrap();
    assert_eq!(stale.len(), 1);

    store.release(&job.id).unwrap();
    assert!(store.list_in_progress().unwrap().is_empty());
    let stored = store.fetch_by_id(&job.id).unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
}

#[test]
fn count_by_status_summarizes_queue() {
    let dir = TempDir::new().unwrap();
    let (store, _) = temp_store(dir.path());

    for n in 0..3 {
        store
            .create(&JobDraft::new(
                format!("https://h/{n}.mp4"),
                JobKind::SingleFile,
            ))
            .unwrap();
    }
    let claimed = store.claim_next().unwrap().unwrap();
    store.mark_failed(&claimed.id, "boom").unwrap();

    let counts = store.count_by_status().unwrap();
    assert_eq!(counts.get("pending"), Some(&2));
    assert_eq!(counts.get("failed"), Some(&1));
    assert_eq!(counts.get("in_progress"), None);
}
