//! Prime database builder
//!
//! Streams primes out of the segmented sieve, groups them into fixed-size
//! segments and appends each one to the store. A build that stops early,
//! whether by the stop flag or a crash, resumes after the last segment that
//! was fully written.

use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crate::sieve::SegmentedSieve;
use crate::storage::{GenerationStatus, Segment, SegmentInfo, SegmentStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of one `generate` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildReport {
    /// Segments appended by this run
    pub segments_written: u64,
    /// Primes appended by this run
    pub primes_generated: u64,
    /// Primes in the store after this run
    pub total_primes: u64,
    pub last_segment_id: Option<u64>,
    /// Stopped by the stop flag before reaching the target
    pub interrupted: bool,
    pub elapsed: Duration,
    pub status: GenerationStatus,
}

/// Single-writer driver that fills a segment store
pub struct PrimeDatabaseBuilder {
    store: Arc<dyn SegmentStore>,
    stop: Arc<AtomicBool>,
    progress_log_interval: u64,
}

impl PrimeDatabaseBuilder {
    pub fn new(store: Arc<dyn SegmentStore>) -> Self {
        Self {
            store,
            stop: Arc::new(AtomicBool::new(false)),
            progress_log_interval: 100,
        }
    }

    /// Share a stop flag with a signal handler.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn progress_log_interval(mut self, interval: u64) -> Self {
        self.progress_log_interval = interval;
        self
    }

    /// Setting the returned flag stops `generate` before its next prime.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Generate primes until the store holds `target_count` of them.
    ///
    /// Primes buffered for an unfinished segment are dropped when the stop
    /// flag is raised; the status then stays `in_progress`.
    pub async fn generate(
        &self,
        target_count: u64,
        segment_size: u64,
        sieve_window_size: u64,
    ) -> Result<BuildReport> {
        if target_count == 0 || segment_size == 0 || sieve_window_size == 0 {
            return Err(Error::InvalidArgument(format!(
                "target_count ({}), segment_size ({}) and sieve_window_size ({}) must be positive",
                target_count, segment_size, sieve_window_size
            )));
        }
        let window = usize::try_from(sieve_window_size).map_err(|_| {
            Error::InvalidArgument(format!("sieve window {} too large", sieve_window_size))
        })?;

        let started = Instant::now();
        self.store.set_target(target_count).await?;

        let last = self.store.last_segment().await?;
        let (mut next_id, mut next_index, resume_from) = match &last {
            Some(segment) => (
                segment.segment_id + 1,
                segment.end_index + 1,
                segment.last_prime()? + 1,
            ),
            None => (0, 1, 0),
        };
        let mut last_segment_id = last.as_ref().map(|segment| segment.segment_id);
        let existing = next_index - 1;

        if existing >= target_count {
            info!(existing, target = target_count, "Store already holds the target prime count");
            self.store.set_status(GenerationStatus::Completed).await?;
            return Ok(BuildReport {
                segments_written: 0,
                primes_generated: 0,
                total_primes: existing,
                last_segment_id,
                interrupted: false,
                elapsed: started.elapsed(),
                status: GenerationStatus::Completed,
            });
        }

        self.store.set_status(GenerationStatus::InProgress).await?;
        info!(
            target = target_count,
            segment_size,
            window = sieve_window_size,
            resume_index = next_index,
            resume_from,
            "Starting prime generation"
        );

        let tracker =
            ProgressTracker::new(target_count, existing).log_interval(self.progress_log_interval);
        let mut sieve = SegmentedSieve::starting_at(resume_from, window);
        let capacity = segment_size.min(target_count - existing);
        let mut buffer = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        let mut total = existing;
        let mut segments_written = 0;
        let mut interrupted = false;

        while total + (buffer.len() as u64) < target_count {
            if self.stop.load(Ordering::Relaxed) {
                interrupted = true;
                break;
            }

            let prime = sieve.next().ok_or_else(|| {
                Error::GenerationFailure("prime sequence exhausted the u64 range".to_string())
            })?;
            buffer.push(prime);

            let buffered = buffer.len() as u64;
            if buffered == segment_size || total + buffered == target_count {
                let info = self.flush(next_id, next_index, &buffer).await?;
                total += buffered;
                next_id = info.segment_id + 1;
                next_index = info.end_index + 1;
                last_segment_id = Some(info.segment_id);
                segments_written += 1;
                buffer.clear();

                let progress = tracker.record_progress(info.segment_id, sieve.cursor(), total);
                self.store.write_progress(&progress).await?;
            }
        }

        let status = if interrupted {
            warn!(
                total,
                discarded = buffer.len(),
                "Generation interrupted, status left in progress"
            );
            GenerationStatus::InProgress
        } else {
            self.store.set_status(GenerationStatus::Completed).await?;
            info!(total, segments = segments_written, "Generation completed");
            GenerationStatus::Completed
        };

        Ok(BuildReport {
            segments_written,
            primes_generated: total - existing,
            total_primes: total,
            last_segment_id,
            interrupted,
            elapsed: started.elapsed(),
            status,
        })
    }

    async fn flush(&self, segment_id: u64, start_index: u64, primes: &[u64]) -> Result<SegmentInfo> {
        let segment = Segment::from_primes(segment_id, start_index, primes)?;
        if segment.primes()? != primes {
            return Err(Error::GenerationFailure(format!(
                "segment {} does not reconstruct its primes",
                segment_id
            )));
        }

        let info = self.store.append_segment(segment).await?;
        debug!(
            segment = info.segment_id,
            start = info.start_index,
            end = info.end_index,
            bytes = info.compressed_len,
            "Segment written"
        );
        Ok(info)
    }
}

/// Fix a status left behind by an interrupted build.
///
/// Segments present under `not_started` become `in_progress`; a store that
/// already holds its target becomes `completed`. Returns the new status when
/// it changed.
pub async fn repair_generation_status(store: &dyn SegmentStore) -> Result<Option<GenerationStatus>> {
    let stats = store.stats().await?;

    let repaired = match stats.status {
        GenerationStatus::NotStarted if stats.total_segments > 0 => {
            Some(GenerationStatus::InProgress)
        }
        GenerationStatus::InProgress
            if stats.target_count > 0 && stats.max_prime_index >= stats.target_count =>
        {
            Some(GenerationStatus::Completed)
        }
        _ => None,
    };

    if let Some(status) = repaired {
        store.set_status(status).await?;
        info!(from = %stats.status, to = %status, "Generation status repaired");
    }
    Ok(repaired)
}
