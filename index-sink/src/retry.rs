use absa_core::{ErrorExt, SinkConfig, SinkError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Retry and circuit-breaker settings for bulk writes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per batch, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Failed batches in a row before the breaker opens
    pub failure_threshold: u32,
    pub recovery_timeout_s: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 600,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            failure_threshold: 5,
            recovery_timeout_s: 30,
        }
    }
}

impl RetryConfig {
    pub fn from_sink(config: &SinkConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            failure_threshold: config.max_consecutive_failures.max(1),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            failure_threshold: config.failure_threshold,
            recovery_timeout: Duration::from_secs(config.recovery_timeout_s),
        }
    }

    pub fn allow_request(&mut self) -> bool {
        match self.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => match self.last_failure_time {
                Some(last) if last.elapsed() >= self.recovery_timeout => {
                    debug!("Circuit breaker half-open, probing sink");
                    self.state = CircuitBreakerState::HalfOpen;
                    true
                }
                _ => false,
            },
        }
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitBreakerState::HalfOpen {
            info!("Sink recovered, circuit breaker closed");
        }
        self.state = CircuitBreakerState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        match self.state {
            CircuitBreakerState::Closed if self.failure_count >= self.failure_threshold => {
                warn!(
                    "Circuit breaker opening after {} failed batches",
                    self.failure_count
                );
                self.state = CircuitBreakerState::Open;
            }
            CircuitBreakerState::HalfOpen => {
                warn!("Trial request failed, circuit breaker open again");
                self.state = CircuitBreakerState::Open;
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.state
    }

    /// Failed batches since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.failure_count
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    Retry,
    RetryWithDelay(Duration),
    NoRetry,
}

pub fn retry_strategy(error: &SinkError) -> RetryStrategy {
    match error {
        SinkError::Rejected { status_code: 429 } => error
            .retry_after()
            .map(RetryStrategy::RetryWithDelay)
            .unwrap_or(RetryStrategy::Retry),
        e if e.is_retryable() => RetryStrategy::Retry,
        _ => RetryStrategy::NoRetry,
    }
}

/// Exponential backoff capped at `max_delay_ms`, plus up to
/// `jitter_factor` of random extra delay.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);
    let exponential = Duration::from_millis(delay_ms);

    let jitter_range = (delay_ms as f64 * config.jitter_factor) as u64;
    let jitter = Duration::from_millis(fastrand::u64(0..=jitter_range));

    (exponential + jitter).min(max_delay)
}

#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_batches: u64,
    pub circuit_breaker_trips: u64,
}

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    circuit_breaker: Arc<Mutex<CircuitBreaker>>,
    metrics: Arc<Mutex<RetryMetrics>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            circuit_breaker: Arc::new(Mutex::new(CircuitBreaker::new(&config))),
            metrics: Arc::new(Mutex::new(RetryMetrics::default())),
            config,
        }
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.circuit_breaker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn metrics_mut(&self) -> MutexGuard<'_, RetryMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `operation` until it succeeds, hits a non-retryable error or
    /// runs out of attempts. Returns the last error on failure.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, SinkError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, SinkError>>,
    {
        if !self.breaker().allow_request() {
            self.metrics_mut().circuit_breaker_trips += 1;
            warn!("Circuit breaker is open, skipping {}", operation_name);
            return Err(SinkError::CircuitOpen);
        }

        let mut total_delay = Duration::ZERO;
        let mut attempt = 0;
        let last_error = loop {
            match operation().await {
                Ok(result) => {
                    self.breaker().record_success();
                    if attempt > 0 {
                        let mut metrics = self.metrics_mut();
                        metrics.total_retries += attempt as u64;
                        metrics.successful_retries += 1;
                        info!(
                            "{} succeeded after {} retries ({:?} waited)",
                            operation_name, attempt, total_delay
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let attempts_left = attempt + 1 < self.config.max_attempts;
                    let delay = match retry_strategy(&error) {
                        RetryStrategy::Retry if attempts_left => {
                            calculate_delay(attempt, &self.config)
                        }
                        RetryStrategy::RetryWithDelay(delay) if attempts_left => delay,
                        _ => break error,
                    };

                    info!("Retrying {} in {:?}: {}", operation_name, delay, error);
                    total_delay += delay;
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        self.breaker().record_failure();
        {
            let mut metrics = self.metrics_mut();
            metrics.total_retries += attempt as u64;
            metrics.failed_batches += 1;
        }

        error!(
            "{} failed after {} attempts: {}",
            operation_name,
            attempt + 1,
            last_error
        );
        Err(last_error)
    }

    pub fn metrics(&self) -> RetryMetrics {
        self.metrics_mut().clone()
    }

    pub fn circuit_state(&self) -> CircuitBreakerState {
        self.breaker().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_sink_config() {
        let config = RetryConfig::from_sink(&SinkConfig::default());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 600);
        assert_eq!(config.failure_threshold, 5);
    }

    #[test]
    fn test_circuit_breaker_opens_at_threshold() {
        let config = RetryConfig {
            failure_threshold: 2,
            ..Default::default()
        };
        let mut breaker = CircuitBreaker::new(&config);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        assert!(breaker.allow_request());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitBreakerState::Open);
        assert!(!breaker.allow_request());
        assert_eq!(breaker.consecutive_failures(), 2);
    }

    #[test]
    fn test_circuit_breaker_recovery() {
        let config = RetryConfig {
            failure_threshold: 1,
            recovery_timeout_s: 0,
            ..Default::default()
        };
        let mut breaker = CircuitBreaker::new(&config);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        std::thread::sleep(Duration::from_millis(1));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitBreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_retry_strategy_for_sink_errors() {
        assert_eq!(
            retry_strategy(&SinkError::Rejected { status_code: 429 }),
            RetryStrategy::RetryWithDelay(Duration::from_secs(5))
        );
        assert_eq!(
            retry_strategy(&SinkError::Rejected { status_code: 503 }),
            RetryStrategy::Retry
        );
        assert_eq!(
            retry_strategy(&SinkError::Rejected { status_code: 400 }),
            RetryStrategy::NoRetry
        );
        assert_eq!(
            retry_strategy(&SinkError::InvalidResponse {
                details: "garbage".to_string()
            }),
            RetryStrategy::NoRetry
        );
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(8000));
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(10_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[tokio::test]
    async fn test_executor_recovers_after_transient_failures() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("bulk", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SinkError::Unavailable {
                        endpoint: "http://es".to_string(),
                        reason: "connection refused".to_string(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        let metrics = executor.metrics();
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.successful_retries, 1);
    }

    #[tokio::test]
    async fn test_executor_does_not_retry_client_errors() {
        let executor = RetryExecutor::new(fast_config());
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("bulk", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SinkError::Rejected { status_code: 400 })
            })
            .await;

        assert!(matches!(result, Err(SinkError::Rejected { status_code: 400 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.metrics().failed_batches, 1);
    }

    #[tokio::test]
    async fn test_executor_trips_circuit_breaker() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 2,
            failure_threshold: 2,
            ..fast_config()
        });
        let unavailable = || async {
            Err::<(), _>(SinkError::Unavailable {
                endpoint: "http://es".to_string(),
                reason: "down".to_string(),
            })
        };

        assert!(executor.execute("bulk-1", unavailable).await.is_err());
        assert!(executor.execute("bulk-2", unavailable).await.is_err());
        assert_eq!(executor.circuit_state(), CircuitBreakerState::Open);

        let blocked = executor.execute("bulk-3", || async { Ok(()) }).await;
        assert!(matches!(blocked, Err(SinkError::CircuitOpen)));
        assert_eq!(executor.metrics().circuit_breaker_trips, 1);
    }
}
