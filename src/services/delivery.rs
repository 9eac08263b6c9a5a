//! Batched delivery of aggregates with shrinking batches and backoff
//!
//! Keys are sorted so batches (and logs) are reproducible. Each attempt posts
//! the remaining keys in batches; a failed batch marks all of its keys failed
//! but doesn't stop the attempt. Failed keys are retried with half the batch
//! size (floored) after an exponentially growing delay (capped). Smaller
//! batches on retry narrow down which records a failing batch choked on.

use crate::domain::aggregate::{AggregateKey, Aggregates};
use crate::infra::config::{Config, RetryConfig};
use crate::infra::metrics::RunMetrics;
use crate::io::libinsight::{BatchSink, SinkRecord};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument, Span};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("too many retries; aborting with {remaining} keys undelivered after {attempts} attempts")]
    TooManyRetries { attempts: u32, remaining: usize },
}

/// Batch sizing and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_batch_size: usize,
    pub min_batch_size: usize,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_retry_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self::from_retry_config(config.retry())
    }

    fn from_retry_config(retry: &RetryConfig) -> Self {
        Self {
            initial_batch_size: retry.initial_batch_size,
            // A zero floor would make batching impossible
            min_batch_size: retry.min_batch_size.max(1),
            max_attempts: retry.max_attempts,
            base_delay: Duration::from_secs(retry.base_delay_secs),
            max_delay: Duration::from_secs(retry.max_delay_secs),
        }
    }

    /// Batch size for 0-indexed `attempt`: halves each time, never below the floor
    pub fn batch_size(&self, attempt: u32) -> usize {
        self.initial_batch_size.checked_shr(attempt).unwrap_or(0).max(self.min_batch_size)
    }

    /// Delay after 0-indexed `attempt` fails: doubles each time, capped
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Posts aggregates to a sink until every key is accepted or retries run out
pub struct Deliverer<S: BatchSink> {
    sink: S,
    policy: RetryPolicy,
    metrics: Arc<RunMetrics>,
    span: Span,
}

impl<S: BatchSink> Deliverer<S> {
    pub fn new(sink: S, policy: RetryPolicy, metrics: Arc<RunMetrics>) -> Self {
        Self { sink, policy, metrics, span: tracing::info_span!("libinsight") }
    }

    /// Log inside `span` instead of the default `libinsight` span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn deliver(&self, aggregates: &Aggregates) -> Result<(), DeliveryError> {
        self.deliver_all(aggregates).instrument(self.span.clone()).await
    }

    async fn deliver_all(&self, aggregates: &Aggregates) -> Result<(), DeliveryError> {
        let mut keys = aggregates.sorted_keys();
        let mut attempt = 0;

        while attempt < self.policy.max_attempts {
            let size = self.policy.batch_size(attempt);
            info!(keys = %keys.len(), batch_size = %size, attempt = %(attempt + 1), "libinsight_posting");

            let failed = self.post_in_batches(aggregates, &keys, size).await;
            if failed.is_empty() {
                info!("libinsight_all_posted");
                return Ok(());
            }

            keys = failed;
            attempt += 1;
            if attempt == self.policy.max_attempts {
                break;
            }

            let delay = self.policy.delay(attempt - 1);
            info!(delay_ms = %delay.as_millis(), remaining = %keys.len(), "libinsight_retry_delay");
            self.metrics.record_retry();
            tokio::time::sleep(delay).await;
        }

        Err(DeliveryError::TooManyRetries { attempts: attempt, remaining: keys.len() })
    }

    /// Post one attempt's worth of keys, returning the keys that failed
    async fn post_in_batches(
        &self,
        aggregates: &Aggregates,
        keys: &[AggregateKey],
        size: usize,
    ) -> Vec<AggregateKey> {
        let mut failed = Vec::new();

        for chunk in keys.chunks(size) {
            let batch: Vec<SinkRecord> = chunk
                .iter()
                .filter_map(|key| aggregates.get(key))
                .map(SinkRecord::from_total)
                .collect();

            debug!(records = %batch.len(), first_key = %chunk[0], "libinsight_batch_post");
            match self.sink.post_batch(&batch).await {
                Ok(()) => self.metrics.record_batch_ok(chunk.len()),
                Err(e) => {
                    warn!(error = %e, records = %chunk.len(), first_key = %chunk[0], "libinsight_batch_failed");
                    self.metrics.record_batch_failed();
                    failed.extend_from_slice(chunk);
                }
            }
        }

        failed
    }
}
