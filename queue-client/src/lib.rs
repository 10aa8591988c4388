//! Inbound post queue.
//!
//! The worker only ever pops: a payload is a JSON string pushed to a Redis
//! list by the ingester. `pop` waits at most `timeout` and returns `None`
//! when nothing arrived, so the caller can check for shutdown between waits.

use absa_core::QueueError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

#[async_trait]
pub trait PostQueue: Send + Sync {
    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError>;

    /// Human-readable source name for logs.
    fn describe(&self) -> String;
}

/// Redis list consumed with BLPOP.
pub struct RedisQueue {
    conn: ConnectionManager,
    url: String,
    queue: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, queue: &str) -> Result<Self, QueueError> {
        let connection_failed = |e: redis::RedisError| QueueError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let client = redis::Client::open(url).map_err(connection_failed)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(connection_failed)?;

        info!("Connected to Redis at {}, consuming '{}'", url, queue);
        Ok(Self {
            conn,
            url: url.to_string(),
            queue: queue.to_string(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Number of payloads waiting in the list.
    pub async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("LLEN")
            .arg(&self.queue)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.pop_failed(e))
    }

    fn pop_failed(&self, error: redis::RedisError) -> QueueError {
        if error.is_connection_dropped() || error.is_io_error() || error.is_connection_refusal() {
            QueueError::ConnectionFailed {
                url: self.url.clone(),
                reason: error.to_string(),
            }
        } else {
            QueueError::PopFailed {
                queue: self.queue.clone(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl PostQueue for RedisQueue {
    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();

        // BLPOP takes fractional seconds; 0 would block forever.
        let secs = timeout.as_secs_f64().max(0.01);
        let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(&self.queue)
            .arg(secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.pop_failed(e))?;

        match popped {
            Some((_, bytes)) => decode_payload(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("redis {} / {}", self.url, self.queue)
    }
}

/// In-process queue fed through an mpsc channel. Used by tests and by
/// tooling that replays payloads without Redis.
pub struct ChannelQueue {
    receiver: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl ChannelQueue {
    pub fn new(capacity: usize) -> (QueueSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            QueueSender { tx },
            Self {
                receiver: Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl PostQueue for ChannelQueue {
    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut rx = self.receiver.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(bytes)) => decode_payload(bytes).map(Some),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }

    fn describe(&self) -> String {
        "in-process channel".to_string()
    }
}

#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<Vec<u8>>,
}

impl QueueSender {
    pub async fn push(&self, payload: impl Into<String>) -> Result<(), QueueError> {
        self.push_bytes(payload.into().into_bytes()).await
    }

    pub async fn push_bytes(&self, bytes: Vec<u8>) -> Result<(), QueueError> {
        self.tx.send(bytes).await.map_err(|_| QueueError::Closed)
    }
}

fn decode_payload(bytes: Vec<u8>) -> Result<String, QueueError> {
    String::from_utf8(bytes).map_err(|_| {
        debug!("Dropping non UTF-8 payload");
        QueueError::InvalidEncoding
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_queue_preserves_order() {
        let (tx, queue) = ChannelQueue::new(8);
        tx.push("first").await.unwrap();
        tx.push("second").await.unwrap();

        let timeout = Duration::from_millis(50);
        assert_eq!(queue.pop(timeout).await.unwrap().as_deref(), Some("first"));
        assert_eq!(queue.pop(timeout).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_empty_pop_times_out_with_none() {
        let (_tx, queue) = ChannelQueue::new(1);
        let popped = queue.pop(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_reports_closed() {
        let (tx, queue) = ChannelQueue::new(1);
        drop(tx);
        assert!(matches!(
            queue.pop(Duration::from_millis(20)).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let (tx, queue) = ChannelQueue::new(2);
        tx.push_bytes(vec![0xff, 0xfe]).await.unwrap();
        tx.push("{}").await.unwrap();

        let timeout = Duration::from_millis(50);
        assert!(matches!(
            queue.pop(timeout).await,
            Err(QueueError::InvalidEncoding)
        ));
        // The bad payload is consumed, the next one is still delivered.
        assert_eq!(queue.pop(timeout).await.unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_connect_rejects_bad_url() {
        let result = tokio_test::block_on(RedisQueue::connect("not a url", "q"));
        assert!(matches!(result, Err(QueueError::ConnectionFailed { .. })));
    }
}
