//! The dequeue → analyze → index loop.

use crate::pipeline::{AnalysisPipeline, StageFailure};
use crate::stage::ProcessingStage;
use absa_core::{
    CoreError, ErrorExt, ErrorRecovery, QueueError, RawPost, RecoveryStrategy, RunStats,
    StatsAggregator,
};
use index_sink::BatchWriter;
use queue_client::PostQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub pop_timeout: Duration,
    /// Log a stats snapshot every N finished posts (0 disables).
    pub stats_every: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(1),
            stats_every: 20,
        }
    }
}

pub struct Worker {
    queue: Arc<dyn PostQueue>,
    pipeline: AnalysisPipeline,
    writer: BatchWriter,
    stats: StatsAggregator,
    settings: WorkerSettings,
    handled: u64,
    pop_failures: u32,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn PostQueue>,
        pipeline: AnalysisPipeline,
        writer: BatchWriter,
        settings: WorkerSettings,
    ) -> Self {
        let stats = pipeline.stats().clone();
        Self {
            queue,
            pipeline,
            writer,
            stats,
            settings,
            handled: 0,
            pop_failures: 0,
        }
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Consume posts until `shutdown` flips to true (or its sender is
    /// dropped), then flush what is buffered. Returns the final stats, or the
    /// error that made the worker stop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunStats, CoreError> {
        info!(
            "Worker started: queue={} sink={} filter_mode={}",
            self.queue.describe(),
            self.writer.sink().describe(),
            self.pipeline.filter_mode().name
        );

        let result = self.consume(&mut shutdown).await;

        // Whatever stopped the loop, buffered documents still get their chance.
        let flushed = self.writer.flush().await;
        self.stats.log_snapshot(&self.pipeline.filter_mode().name);
        let retry = self.writer.retry_metrics();
        info!(
            "Sink retries: {} total, {} recovered batches, {} failed batches, {} breaker trips (circuit {:?})",
            retry.total_retries,
            retry.successful_retries,
            retry.failed_batches,
            retry.circuit_breaker_trips,
            self.writer.circuit_state()
        );

        result?;
        flushed?;
        info!("Worker stopped cleanly");
        Ok(self.stats.snapshot())
    }

    async fn consume(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<(), CoreError> {
        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, draining");
                return Ok(());
            }

            let popped = tokio::select! {
                popped = self.queue.pop(self.settings.pop_timeout) => popped,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed, draining");
                        return Ok(());
                    }
                    continue;
                }
            };

            match popped {
                Ok(Some(payload)) => {
                    self.pop_failures = 0;
                    self.handle(&payload).await?;
                }
                Ok(None) => {}
                Err(e) => self.on_queue_error(e).await?,
            }

            self.writer.flush_if_due().await?;
        }
    }

    /// Process one payload to its final stage.
    pub async fn handle(&mut self, payload: &str) -> Result<ProcessingStage, CoreError> {
        let stage = match RawPost::from_json(payload) {
            Ok(post) => {
                let id = post.id.clone();
                match self.pipeline.analyze(post).await {
                    Ok(doc) => {
                        debug!("[{}] post {}", ProcessingStage::Assembling, id);
                        self.writer.push(doc).await?;
                        ProcessingStage::Indexed
                    }
                    Err(failure) => self.fail(&id, failure),
                }
            }
            Err(error) => self.fail(
                "?",
                StageFailure {
                    stage: ProcessingStage::Dequeued,
                    error,
                },
            ),
        };

        self.handled += 1;
        if self.settings.stats_every > 0 && self.handled % self.settings.stats_every == 0 {
            self.stats.log_snapshot(&self.pipeline.filter_mode().name);
        }
        Ok(stage)
    }

    fn fail(&self, id: &str, failure: StageFailure) -> ProcessingStage {
        match ErrorRecovery::determine_strategy(&failure.error) {
            RecoveryStrategy::Skip => warn!(
                "Post {} skipped at stage {}: {}",
                id,
                failure.stage,
                failure.error.user_friendly_message()
            ),
            _ => error!(
                "Post {} failed at stage {}: {}",
                id, failure.stage, failure.error
            ),
        }
        // Never requeued.
        self.stats.record_outcome(false);
        ProcessingStage::Failed
    }

    async fn on_queue_error(&mut self, error: QueueError) -> Result<(), CoreError> {
        let error = CoreError::Queue(error);
        match ErrorRecovery::determine_strategy(&error) {
            RecoveryStrategy::Skip => {
                warn!("Dropping queue entry: {}", error);
                self.stats.record_outcome(false);
                Ok(())
            }
            RecoveryStrategy::RetryWithBackoff {
                max_attempts,
                initial_delay,
                max_delay,
            } => {
                self.pop_failures += 1;
                if self.pop_failures as usize > max_attempts {
                    error.log_error();
                    return Err(error);
                }
                let delay = initial_delay
                    .saturating_mul(1u32 << (self.pop_failures - 1).min(16))
                    .min(max_delay);
                warn!(
                    "Queue unavailable ({}), retry {}/{} in {:?}",
                    error, self.pop_failures, max_attempts, delay
                );
                sleep(delay).await;
                Ok(())
            }
            _ => {
                error.log_error();
                Err(error)
            }
        }
    }
}
