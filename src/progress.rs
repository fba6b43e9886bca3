//! Generation progress tracking
//!
//! One `GenerationProgress` record is overwritten after every segment flush.
//! It exists for status reporting and resumption hints only; lookups never
//! read it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

/// Singleton progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProgress {
    /// Id of the most recently flushed segment
    pub current_segment: u64,
    /// Highest number the sieve has scanned
    pub current_number: u64,
    /// Primes persisted so far, across all runs
    pub primes_generated: u64,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub target_prime_count: u64,
    /// Primes per second in the current run
    pub rate_per_second: f64,
}

impl GenerationProgress {
    pub fn percent_complete(&self) -> f64 {
        if self.target_prime_count == 0 {
            return 0.0;
        }
        (self.primes_generated as f64 / self.target_prime_count as f64 * 100.0).min(100.0)
    }

    pub fn remaining(&self) -> u64 {
        self.target_prime_count.saturating_sub(self.primes_generated)
    }
}

/// Derives rate and ETA for a running build
#[derive(Debug)]
pub struct ProgressTracker {
    target: u64,
    /// Primes already persisted when this run started
    baseline: u64,
    started: Instant,
    start_time: DateTime<Utc>,
    log_interval: u64,
}

impl ProgressTracker {
    /// Start tracking a run towards `target` primes, `baseline` of which
    /// were persisted by earlier runs.
    pub fn new(target: u64, baseline: u64) -> Self {
        Self {
            target,
            baseline,
            started: Instant::now(),
            start_time: Utc::now(),
            log_interval: 100,
        }
    }

    /// Log a progress line every `interval` segments (0 disables it).
    pub fn log_interval(mut self, interval: u64) -> Self {
        self.log_interval = interval;
        self
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Build the progress record after flushing `segment_id`.
    pub fn record_progress(
        &self,
        segment_id: u64,
        cursor: u64,
        total_generated: u64,
    ) -> GenerationProgress {
        let progress = self.snapshot(
            segment_id,
            cursor,
            total_generated,
            self.started.elapsed(),
            Utc::now(),
        );

        if self.log_interval > 0 && segment_id % self.log_interval == 0 {
            info!(
                segment = segment_id,
                primes = total_generated,
                cursor,
                percent = progress.percent_complete(),
                rate = progress.rate_per_second as u64,
                eta = ?progress.estimated_completion,
                "Generation progress"
            );
        }

        progress
    }

    /// Pure computation behind `record_progress`.
    pub fn snapshot(
        &self,
        segment_id: u64,
        cursor: u64,
        total_generated: u64,
        elapsed: Duration,
        now: DateTime<Utc>,
    ) -> GenerationProgress {
        let produced = total_generated.saturating_sub(self.baseline);
        let seconds = elapsed.as_secs_f64();
        let rate_per_second = if seconds > 0.0 {
            produced as f64 / seconds
        } else {
            0.0
        };

        let remaining = self.target.saturating_sub(total_generated);
        let estimated_completion = if remaining == 0 {
            Some(now)
        } else if rate_per_second > 0.0 {
            let millis = (remaining as f64 / rate_per_second * 1000.0).min(i64::MAX as f64);
            ChronoDuration::try_milliseconds(millis as i64).and_then(|eta| now.checked_add_signed(eta))
        } else {
            None
        };

        GenerationProgress {
            current_segment: segment_id,
            current_number: cursor,
            primes_generated: total_generated,
            start_time: self.start_time,
            last_update: now,
            estimated_completion,
            target_prime_count: self.target,
            rate_per_second,
        }
    }
}
