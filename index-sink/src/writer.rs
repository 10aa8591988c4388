use crate::retry::{CircuitBreakerState, RetryConfig, RetryExecutor, RetryMetrics};
use crate::sink::IndexSink;
use absa_core::{AnalyzedDocument, SinkConfig, SinkError, StatsAggregator, StatsEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// What happened to the documents of one flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub indexed: usize,
    pub failed: usize,
    /// Documents lost with a batch that exhausted its retries.
    pub dropped: usize,
}

/// Buffers documents and hands them to the sink in order, `batch_size` at a
/// time or when `flush_interval` has passed.
///
/// Every buffered document ends up recorded in the stats exactly once, as
/// indexed or as an error. A run of `max_consecutive_failures` dropped
/// batches makes `flush` return [`SinkError::PermanentlyUnreachable`].
pub struct BatchWriter {
    sink: Arc<dyn IndexSink>,
    executor: RetryExecutor,
    attempts_per_batch: u32,
    stats: StatsAggregator,
    buffer: Vec<AnalyzedDocument>,
    batch_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
    max_consecutive_failures: u32,
    dropped_in_a_row: u32,
}

impl BatchWriter {
    pub fn new(sink: Arc<dyn IndexSink>, config: &SinkConfig, stats: StatsAggregator) -> Self {
        let retry = RetryConfig::from_sink(config);
        Self {
            sink,
            attempts_per_batch: retry.max_attempts,
            executor: RetryExecutor::new(retry),
            stats,
            buffer: Vec::with_capacity(config.batch_size),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
            last_flush: Instant::now(),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            dropped_in_a_row: 0,
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.attempts_per_batch = retry.max_attempts;
        self.executor = RetryExecutor::new(retry);
        self
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn sink(&self) -> &Arc<dyn IndexSink> {
        &self.sink
    }

    pub fn retry_metrics(&self) -> RetryMetrics {
        self.executor.metrics()
    }

    pub fn circuit_state(&self) -> CircuitBreakerState {
        self.executor.circuit_state()
    }

    pub fn is_due(&self) -> bool {
        !self.buffer.is_empty() && self.last_flush.elapsed() >= self.flush_interval
    }

    pub async fn push(&mut self, doc: AnalyzedDocument) -> Result<Option<FlushReport>, SinkError> {
        self.buffer.push(doc);
        if self.buffer.len() >= self.batch_size || self.is_due() {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    pub async fn flush_if_due(&mut self) -> Result<Option<FlushReport>, SinkError> {
        if self.is_due() {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    pub async fn flush(&mut self) -> Result<FlushReport, SinkError> {
        self.last_flush = Instant::now();
        let batch = std::mem::take(&mut self.buffer);
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }

        let sink = Arc::clone(&self.sink);
        let result = self
            .executor
            .execute("bulk write", || sink.write_batch(&batch))
            .await;

        match result {
            Ok(report) => {
                self.dropped_in_a_row = 0;
                for failure in &report.failed {
                    warn!("Document {} refused by sink: {}", failure.id, failure.reason);
                }
                self.record(report.indexed.len(), true);
                self.record(report.failed.len(), false);
                debug!(
                    "Flushed {} documents to {}",
                    batch.len(),
                    self.sink.describe()
                );
                Ok(FlushReport {
                    indexed: report.indexed.len(),
                    failed: report.failed.len(),
                    dropped: 0,
                })
            }
            Err(e) => {
                self.dropped_in_a_row += 1;
                self.record(batch.len(), false);
                self.stats.record(StatsEvent::BatchDropped);

                let dropped = SinkError::BatchDropped {
                    documents: batch.len(),
                    attempts: self.attempts_per_batch,
                };
                error!("{} ({})", dropped, e);

                if self.dropped_in_a_row >= self.max_consecutive_failures {
                    error!(
                        "FATAL: {} unreachable after {} dropped batches in a row (circuit {:?})",
                        self.sink.describe(),
                        self.dropped_in_a_row,
                        self.circuit_state()
                    );
                    return Err(SinkError::PermanentlyUnreachable {
                        consecutive_failures: self.dropped_in_a_row,
                    });
                }

                Ok(FlushReport {
                    indexed: 0,
                    failed: 0,
                    dropped: batch.len(),
                })
            }
        }
    }

    fn record(&self, count: usize, indexed: bool) {
        for _ in 0..count {
            self.stats.record_outcome(indexed);
        }
    }
}
