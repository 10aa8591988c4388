//! Outbound side of the worker: where analyzed documents are written.

pub mod elasticsearch;
pub mod jsonl;
pub mod retry;
pub mod sink;
pub mod writer;

#[cfg(test)]
mod tests;

pub use elasticsearch::ElasticsearchSink;
pub use jsonl::JsonlSink;
pub use retry::{CircuitBreaker, CircuitBreakerState, RetryConfig, RetryExecutor, RetryMetrics};
pub use sink::{BatchReport, IndexSink, ItemFailure};
pub use writer::{BatchWriter, FlushReport};

use absa_core::{SinkConfig, SinkError, SinkKind};
use std::sync::Arc;

/// Build the sink selected by `config.kind`.
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn IndexSink>, SinkError> {
    match config.kind {
        SinkKind::Elasticsearch => Ok(Arc::new(ElasticsearchSink::new(config)?)),
        SinkKind::Jsonl => {
            let path = config.jsonl_path.as_ref().ok_or_else(|| SinkError::Unavailable {
                endpoint: "jsonl".to_string(),
                reason: "no output path configured".to_string(),
            })?;
            Ok(Arc::new(JsonlSink::new(path)))
        }
    }
}
