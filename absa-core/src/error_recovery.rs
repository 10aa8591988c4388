//! Error recovery strategies for the analysis pipeline.
//!
//! Every error the worker can meet is classified into one of a small set of
//! strategies: retry transport failures with backoff, degrade the current
//! post when an analysis stage fails, skip posts that can never succeed, and
//! fail hard on configuration or exhaustion errors.

use crate::{AnalysisError, CoreError, ErrorExt, QueueError, SinkError};
use std::time::Duration;
use tracing::info;

/// Recovery strategy for handling errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the operation with exponential backoff
    RetryWithBackoff {
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    },
    /// Drop the item and continue with the next one
    Skip,
    /// Continue with the affected result slot left empty
    Degrade,
    /// Fail immediately
    Fail,
}

/// Result of an error recovery attempt
#[derive(Debug)]
pub enum RecoveryResult<T> {
    /// Recovery was successful, operation can continue
    Recovered(T),
    /// Recovery failed, operation should be skipped
    Skipped,
    /// Recovery failed, error should be propagated
    Failed(CoreError),
}

impl<T> RecoveryResult<T> {
    /// Returns true if the operation was successfully recovered
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryResult::Recovered(_))
    }

    /// Returns true if the operation should be skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, RecoveryResult::Skipped)
    }

    /// Returns true if the operation failed and error should be propagated
    pub fn is_failed(&self) -> bool {
        matches!(self, RecoveryResult::Failed(_))
    }

    /// Converts into a plain `Result`, mapping `Skipped` to an internal error
    pub fn into_result(self) -> Result<T, CoreError> {
        match self {
            RecoveryResult::Recovered(value) => Ok(value),
            RecoveryResult::Skipped => Err(CoreError::Internal {
                message: "operation skipped by recovery policy".to_string(),
            }),
            RecoveryResult::Failed(error) => Err(error),
        }
    }

    /// Returns the error if failed, None otherwise
    pub fn err(self) -> Option<CoreError> {
        match self {
            RecoveryResult::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Error recovery handler that provides strategies for different error types
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine the appropriate recovery strategy for a given error
    pub fn determine_strategy(error: &CoreError) -> RecoveryStrategy {
        match error {
            // Any analysis stage failure leaves a hole in the document, nothing more
            CoreError::Analysis(
                AnalysisError::UnsupportedLanguage { .. }
                | AnalysisError::ScorerTimeout { .. }
                | AnalysisError::ScorerUnavailable { .. }
                | AnalysisError::ExtractorTimeout { .. }
                | AnalysisError::ExtractorUnavailable { .. },
            ) => RecoveryStrategy::Degrade,

            // Bad payloads never get better
            CoreError::MalformedInput { .. } | CoreError::Serialization(_) => {
                RecoveryStrategy::Skip
            }

            CoreError::Queue(queue_error) => match queue_error {
                QueueError::ConnectionFailed { .. } | QueueError::PopFailed { .. } => {
                    RecoveryStrategy::RetryWithBackoff {
                        max_attempts: 5,
                        initial_delay: Duration::from_millis(500),
                        max_delay: Duration::from_secs(10),
                    }
                }
                QueueError::InvalidEncoding => RecoveryStrategy::Skip,
                QueueError::Closed => RecoveryStrategy::Fail,
            },

            CoreError::Sink(sink_error) => match sink_error {
                SinkError::Unavailable { .. } | SinkError::Rejected { .. }
                    if sink_error.is_retryable() =>
                {
                    RecoveryStrategy::RetryWithBackoff {
                        max_attempts: 3,
                        initial_delay: Duration::from_millis(600),
                        max_delay: Duration::from_secs(30),
                    }
                }
                SinkError::PermanentlyUnreachable { .. } => RecoveryStrategy::Fail,
                _ => RecoveryStrategy::Skip,
            },

            CoreError::Network(_) | CoreError::Io(_) => RecoveryStrategy::RetryWithBackoff {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
            },

            CoreError::Timeout { .. } => RecoveryStrategy::Degrade,

            // Configuration errors need operator intervention
            CoreError::Config(_) => RecoveryStrategy::Fail,

            CoreError::Internal { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Apply the recovery strategy to an operation.
    ///
    /// `Degrade` and `Fail` both run the operation once; degrading is the
    /// caller's business once it has the error in hand.
    pub async fn apply_strategy<F, T, Fut>(
        strategy: RecoveryStrategy,
        mut operation: F,
    ) -> RecoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>> + Send,
        T: Send,
    {
        match strategy {
            RecoveryStrategy::RetryWithBackoff {
                max_attempts,
                initial_delay,
                max_delay,
            } => Self::retry_with_backoff(operation, max_attempts, initial_delay, max_delay).await,
            RecoveryStrategy::Skip => RecoveryResult::Skipped,
            RecoveryStrategy::Degrade | RecoveryStrategy::Fail => match operation().await {
                Ok(value) => RecoveryResult::Recovered(value),
                Err(error) => RecoveryResult::Failed(error),
            },
        }
    }

    /// Retry an operation with exponential backoff
    async fn retry_with_backoff<F, T, Fut>(
        mut operation: F,
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> RecoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        let mut delay = initial_delay;

        loop {
            match operation().await {
                Ok(result) => return RecoveryResult::Recovered(result),
                Err(error) => {
                    attempt += 1;

                    if attempt >= max_attempts || !error.is_retryable() {
                        return RecoveryResult::Failed(error);
                    }

                    if delay > max_delay {
                        delay = max_delay;
                    }

                    info!(
                        "Recovery attempt {}/{} failed. Retrying after {:?}: {}",
                        attempt,
                        max_attempts,
                        delay,
                        error.user_friendly_message()
                    );

                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(delay * 2, max_delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_with_backoff_failure() {
        let strategy = RecoveryStrategy::RetryWithBackoff {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        };

        let result: RecoveryResult<&str> = ErrorRecovery::apply_strategy(strategy, || async {
            Err(CoreError::Queue(QueueError::ConnectionFailed {
                url: "redis://localhost:6379".to_string(),
                reason: "refused".to_string(),
            }))
        })
        .await;

        assert!(result.is_failed());
    }

    #[tokio::test]
    async fn test_retry_with_backoff_recovers() {
        let strategy = RecoveryStrategy::RetryWithBackoff {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let calls = Arc::new(AtomicUsize::new(0));

        let result = ErrorRecovery::apply_strategy(strategy, || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CoreError::Timeout { millis: 5 })
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert!(result.is_recovered());
        assert_eq!(result.into_result().unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_skip_strategy() {
        let strategy = RecoveryStrategy::Skip;
        let result: RecoveryResult<&str> = ErrorRecovery::apply_strategy(strategy, || async {
            Err(CoreError::MalformedInput {
                reason: "test".to_string(),
            })
        })
        .await;

        assert!(result.is_skipped());
    }

    #[test]
    fn test_determine_strategy() {
        let unsupported = CoreError::Analysis(AnalysisError::UnsupportedLanguage {
            language: "ja".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&unsupported),
            RecoveryStrategy::Degrade
        );

        let malformed = CoreError::missing_field("id");
        assert_eq!(
            ErrorRecovery::determine_strategy(&malformed),
            RecoveryStrategy::Skip
        );

        let sink_down = CoreError::Sink(SinkError::Unavailable {
            endpoint: "http://localhost:9200".to_string(),
            reason: "connection refused".to_string(),
        });
        assert!(matches!(
            ErrorRecovery::determine_strategy(&sink_down),
            RecoveryStrategy::RetryWithBackoff { max_attempts: 3, .. }
        ));

        let exhausted = CoreError::Sink(SinkError::PermanentlyUnreachable {
            consecutive_failures: 5,
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&exhausted),
            RecoveryStrategy::Fail
        );

        let config_error = CoreError::Config(crate::ConfigError::UnknownFilterMode {
            mode: "loose".to_string(),
        });
        assert_eq!(
            ErrorRecovery::determine_strategy(&config_error),
            RecoveryStrategy::Fail
        );
    }
}
