use crate::retry::{CircuitBreakerState, RetryConfig};
use crate::sink::{BatchReport, IndexSink, ItemFailure};
use crate::writer::{BatchWriter, FlushReport};
use absa_core::{AnalyzedDocument, SinkConfig, SinkError, StatsAggregator};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub(crate) fn sample_document(id: &str) -> AnalyzedDocument {
    let now = Utc::now();
    AnalyzedDocument {
        id: id.to_string(),
        text: "I love AI in Morocco! #Morocco #AI".to_string(),
        title: None,
        author: "42".to_string(),
        author_username: None,
        instance: "mastodon.social".to_string(),
        language: "en".to_string(),
        created_at: now,
        url: format!("https://mastodon.social/@amina/{}", id),
        hashtags: vec!["Morocco".to_string(), "AI".to_string()],
        favourites: 3,
        reblogs: 1,
        replies: 0,
        score: 4,
        aspects: vec!["love".to_string(), "ai".to_string(), "morocco".to_string()],
        aspect_sentiments: Vec::new(),
        sentiment: None,
        emotion: None,
        emotions_flat: Vec::new(),
        tone: None,
        topic: None,
        absent_scorers: Vec::new(),
        filter_mode: "balanced".to_string(),
        processing_ms: 3,
        ingested_at: now,
    }
}

enum Reply {
    Accept,
    Refuse(&'static str),
    Fail(SinkError),
}

/// Sink that answers from a script, then indexes everything.
struct ScriptedSink {
    replies: Mutex<VecDeque<Reply>>,
    received: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSink {
    fn with(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            received: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<Vec<String>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexSink for ScriptedSink {
    async fn write_batch(&self, docs: &[AnalyzedDocument]) -> Result<BatchReport, SinkError> {
        self.received
            .lock()
            .unwrap()
            .push(docs.iter().map(|d| d.id.clone()).collect());

        match self.replies.lock().unwrap().pop_front() {
            None | Some(Reply::Accept) => Ok(BatchReport::all_indexed(docs)),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Refuse(id)) => {
                let mut report = BatchReport::all_indexed(docs);
                report.indexed.retain(|i| i != id);
                report.failed.push(ItemFailure {
                    id: id.to_string(),
                    reason: "mapper_parsing_exception".to_string(),
                });
                Ok(report)
            }
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn down() -> SinkError {
    SinkError::Unavailable {
        endpoint: "http://es:9200".to_string(),
        reason: "connection refused".to_string(),
    }
}

fn writer(sink: Arc<ScriptedSink>, batch_size: usize, stats: &StatsAggregator) -> BatchWriter {
    let config = SinkConfig {
        batch_size,
        flush_interval_ms: 60_000,
        max_consecutive_failures: 2,
        ..Default::default()
    };
    BatchWriter::new(sink, &config, stats.clone()).with_retry_config(RetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter_factor: 0.0,
        failure_threshold: 10,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_flushes_at_batch_size_in_order() {
    let sink = ScriptedSink::with(vec![]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink.clone(), 2, &stats);

    assert!(writer.push(sample_document("1")).await.unwrap().is_none());
    let report = writer.push(sample_document("2")).await.unwrap().unwrap();
    assert_eq!(report.indexed, 2);
    writer.push(sample_document("3")).await.unwrap();
    assert_eq!(writer.pending(), 1);
    writer.flush().await.unwrap();

    assert_eq!(sink.received(), vec![vec!["1", "2"], vec!["3"]]);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.indexed, 3);
    assert_eq!(snapshot.processed, 3);
}

#[tokio::test]
async fn test_item_failure_counts_only_that_post() {
    let sink = ScriptedSink::with(vec![Reply::Refuse("2")]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink, 3, &stats);

    for id in ["1", "2", "3"] {
        writer.push(sample_document(id)).await.unwrap();
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.indexed, 2);
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.processed, snapshot.indexed + snapshot.errors);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let sink = ScriptedSink::with(vec![Reply::Fail(down())]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink.clone(), 10, &stats);

    writer.push(sample_document("1")).await.unwrap();
    let report = writer.flush().await.unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(sink.received().len(), 2);
    assert_eq!(stats.snapshot().errors, 0);
}

#[tokio::test]
async fn test_exhausted_batch_is_dropped_as_errors() {
    let sink = ScriptedSink::with(vec![Reply::Fail(down()), Reply::Fail(down())]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink, 10, &stats);

    writer.push(sample_document("1")).await.unwrap();
    writer.push(sample_document("2")).await.unwrap();
    let report = writer.flush().await.unwrap();

    assert_eq!(report.dropped, 2);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.errors, 2);
    assert_eq!(snapshot.batches_dropped, 1);
    assert_eq!(snapshot.processed, 2);
}

#[tokio::test]
async fn test_consecutive_drops_are_fatal() {
    let sink = ScriptedSink::with((0..4).map(|_| Reply::Fail(down())).collect());
    let stats = StatsAggregator::new();
    let mut writer = writer(sink, 10, &stats);

    writer.push(sample_document("1")).await.unwrap();
    assert!(writer.flush().await.is_ok());

    writer.push(sample_document("2")).await.unwrap();
    assert!(matches!(
        writer.flush().await,
        Err(SinkError::PermanentlyUnreachable {
            consecutive_failures: 2
        })
    ));
    assert_eq!(stats.snapshot().errors, 2);
}

#[tokio::test]
async fn test_success_resets_drop_run() {
    let sink = ScriptedSink::with(vec![
        Reply::Fail(down()),
        Reply::Fail(down()),
        Reply::Accept,
        Reply::Fail(SinkError::Rejected { status_code: 400 }),
    ]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink, 10, &stats);

    writer.push(sample_document("1")).await.unwrap();
    assert_eq!(writer.flush().await.unwrap().dropped, 1);

    writer.push(sample_document("2")).await.unwrap();
    assert_eq!(writer.flush().await.unwrap().indexed, 1);

    // Not retried, and not fatal: the previous drop run was broken.
    writer.push(sample_document("3")).await.unwrap();
    assert_eq!(writer.flush().await.unwrap().dropped, 1);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.batches_dropped, 2);
    assert_eq!(snapshot.indexed, 1);
    assert_eq!(snapshot.errors, 2);
}

#[tokio::test]
async fn test_retry_metrics_follow_batches() {
    let sink = ScriptedSink::with(vec![
        Reply::Fail(down()),
        Reply::Accept,
        Reply::Fail(down()),
        Reply::Fail(down()),
    ]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink, 10, &stats);

    writer.push(sample_document("1")).await.unwrap();
    writer.flush().await.unwrap();
    writer.push(sample_document("2")).await.unwrap();
    writer.flush().await.unwrap();

    let metrics = writer.retry_metrics();
    assert_eq!(metrics.total_retries, 2);
    assert_eq!(metrics.successful_retries, 1);
    assert_eq!(metrics.failed_batches, 1);
    assert_eq!(metrics.circuit_breaker_trips, 0);
    assert_eq!(writer.circuit_state(), CircuitBreakerState::Closed);
}

#[tokio::test]
async fn test_empty_flush_is_noop() {
    let sink = ScriptedSink::with(vec![]);
    let stats = StatsAggregator::new();
    let mut writer = writer(sink.clone(), 10, &stats);

    assert_eq!(writer.flush().await.unwrap(), FlushReport::default());
    assert!(writer.flush_if_due().await.unwrap().is_none());
    assert!(sink.received().is_empty());
}
