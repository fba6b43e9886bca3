//! Interrupted and resumed builds against a file-backed store

use primedex::builder::repair_generation_status;
use primedex::storage::log::LOG_FILE_NAME;
use primedex::storage::{GenerationStatus, SegmentStore};
use primedex::{initialize_store, FileSegmentStore, PrimeDatabaseBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("primedex_{}_{}", name, std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    dir
}

async fn build(dir: &Path, target: u64, segment_size: u64) -> Arc<FileSegmentStore> {
    let store = Arc::new(initialize_store(dir).expect("Failed to open store"));
    PrimeDatabaseBuilder::new(store.clone())
        .progress_log_interval(0)
        .generate(target, segment_size, 1000)
        .await
        .expect("Build failed");
    store
}

async fn stored_primes(store: &FileSegmentStore) -> Vec<u64> {
    let mut primes = Vec::new();
    for info in store.segments().await.expect("segments") {
        let segment = store
            .find_segment_for_index(info.start_index)
            .await
            .expect("segment");
        primes.extend(segment.primes().expect("decode"));
    }
    primes
}

#[tokio::test]
async fn test_resume_equals_uninterrupted_build() {
    let resumed_dir = temp_dir("resumed");
    let fresh_dir = temp_dir("fresh");

    drop(build(&resumed_dir, 500, 100).await);
    let resumed = build(&resumed_dir, 1000, 100).await;
    let fresh = build(&fresh_dir, 1000, 100).await;

    // Segment-aligned resume produces identical segments
    assert_eq!(
        resumed.segments().await.expect("segments"),
        fresh.segments().await.expect("segments")
    );
    assert_eq!(stored_primes(&resumed).await, stored_primes(&fresh).await);
    assert_eq!(
        resumed.metadata().await.expect("metadata").generation_status,
        GenerationStatus::Completed
    );

    std::fs::remove_dir_all(resumed_dir).ok();
    std::fs::remove_dir_all(fresh_dir).ok();
}

#[tokio::test]
async fn test_stop_flag_leaves_in_progress() {
    let dir = temp_dir("stopped");
    drop(build(&dir, 200, 100).await);

    let store = Arc::new(initialize_store(&dir).expect("Failed to open store"));
    let builder = PrimeDatabaseBuilder::new(store.clone()).progress_log_interval(0);
    builder.stop_handle().store(true, Ordering::SeqCst);

    let report = builder.generate(1000, 100, 1000).await.expect("Build failed");
    assert!(report.interrupted);
    assert_eq!(report.total_primes, 200);
    assert_eq!(report.last_segment_id, Some(1));

    let metadata = store.metadata().await.expect("metadata");
    assert_eq!(metadata.generation_status, GenerationStatus::InProgress);
    assert_eq!(metadata.target_prime_count, 1000);

    // Nothing to repair: segments exist and status already says in progress
    assert_eq!(repair_generation_status(store.as_ref()).await.expect("repair"), None);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_torn_tail_is_discarded_on_resume() {
    let dir = temp_dir("torn_tail");
    let fresh_dir = temp_dir("torn_tail_fresh");
    drop(build(&dir, 200, 100).await);

    // Half-written record from a crashed builder
    {
        let mut log = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.join(LOG_FILE_NAME))
            .expect("open log");
        log.write_all(&[0x40, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00])
            .expect("write torn record");
    }

    let resumed = build(&dir, 400, 100).await;
    let fresh = build(&fresh_dir, 400, 100).await;
    assert_eq!(stored_primes(&resumed).await, stored_primes(&fresh).await);
    assert_eq!(resumed.stats().await.expect("stats").total_segments, 4);

    // Still readable after another reopen
    let reopened = initialize_store(&dir).expect("Failed to reopen store");
    assert_eq!(reopened.stats().await.expect("stats").max_prime_index, 400);

    std::fs::remove_dir_all(dir).ok();
    std::fs::remove_dir_all(fresh_dir).ok();
}
