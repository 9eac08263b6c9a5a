//! Run counters and the end-of-run summary
//!
//! Counters are atomics so components can share one `Arc<RunMetrics>`
//! without a mutex. They are statistics only; nothing branches on them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
pub struct RunMetrics {
    windows_fetched: AtomicU64,
    records_fetched: AtomicU64,
    aggregate_keys: AtomicU64,
    batches_posted: AtomicU64,
    batches_failed: AtomicU64,
    retry_attempts: AtomicU64,
    keys_delivered: AtomicU64,
    started_at: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            windows_fetched: AtomicU64::new(0),
            records_fetched: AtomicU64::new(0),
            aggregate_keys: AtomicU64::new(0),
            batches_posted: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            keys_delivered: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    #[inline]
    pub fn record_window(&self, records: usize) {
        self.windows_fetched.fetch_add(1, Ordering::Relaxed);
        self.records_fetched.fetch_add(records as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_aggregate_keys(&self, keys: usize) {
        self.aggregate_keys.store(keys as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch_ok(&self, keys: usize) {
        self.batches_posted.fetch_add(1, Ordering::Relaxed);
        self.keys_delivered.fetch_add(keys as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch_failed(&self) {
        self.batches_posted.fetch_add(1, Ordering::Relaxed);
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters (does not reset)
    pub fn report(&self) -> RunSummary {
        RunSummary {
            windows_fetched: self.windows_fetched.load(Ordering::Relaxed),
            records_fetched: self.records_fetched.load(Ordering::Relaxed),
            aggregate_keys: self.aggregate_keys.load(Ordering::Relaxed),
            batches_posted: self.batches_posted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            keys_delivered: self.keys_delivered.load(Ordering::Relaxed),
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub windows_fetched: u64,
    pub records_fetched: u64,
    pub aggregate_keys: u64,
    pub batches_posted: u64,
    pub batches_failed: u64,
    pub retry_attempts: u64,
    pub keys_delivered: u64,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            windows = %self.windows_fetched,
            records = %self.records_fetched,
            aggregate_keys = %self.aggregate_keys,
            batches = %self.batches_posted,
            batches_failed = %self.batches_failed,
            retries = %self.retry_attempts,
            delivered = %self.keys_delivered,
            elapsed_ms = %self.elapsed_ms,
            "run_summary"
        );
    }
}
