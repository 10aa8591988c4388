use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Analysis(e) => {
                error!("Analysis error details: {:?}", e);
            }
            CoreError::Queue(e) => {
                error!("Queue error details: {:?}", e);
            }
            CoreError::Sink(e) => {
                error!("Sink error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Analysis(e) => e.is_retryable(),
            CoreError::Queue(e) => e.is_retryable(),
            CoreError::Sink(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            CoreError::Io(_) => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::Queue(e) => e.retry_after(),
            CoreError::Sink(e) => e.retry_after(),
            CoreError::Timeout { millis } => Some(Duration::from_millis(*millis)),
            _ if self.is_retryable() => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Analysis(e) => e.user_friendly_message(),
            CoreError::Queue(e) => e.user_friendly_message(),
            CoreError::Sink(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Check that the search cluster is reachable.".to_string()
            }
            CoreError::MalformedInput { reason } => {
                format!("Post rejected as malformed: {}", reason)
            }
            CoreError::Timeout { .. } => "The operation took too long to complete.".to_string(),
            _ => "An unexpected error occurred.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Analysis(_) => "ANALYSIS".to_string(),
            CoreError::Queue(_) => "QUEUE".to_string(),
            CoreError::Sink(_) => "SINK".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::MalformedInput { .. } => "MALFORMED_INPUT".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for AnalysisError {
    fn log_error(&self) -> &Self {
        error!("AnalysisError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("AnalysisError (warning): {}", self);
        self
    }

    // Analysis failures degrade the post instead of being retried.
    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AnalysisError::UnsupportedLanguage { language } => format!(
                "No aspect model for language '{}'. The post is scored without aspects.",
                language
            ),
            AnalysisError::ScorerTimeout { scorer, .. } => {
                format!("The {} scorer timed out; its result is omitted.", scorer)
            }
            AnalysisError::ScorerUnavailable { scorer, .. } => {
                format!("The {} scorer is unavailable; its result is omitted.", scorer)
            }
            AnalysisError::ExtractorTimeout { .. } | AnalysisError::ExtractorUnavailable { .. } => {
                "Aspect extraction failed; the post is scored without aspects.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            AnalysisError::UnsupportedLanguage { .. } => "ANALYSIS_UNSUPPORTED_LANGUAGE".to_string(),
            AnalysisError::ScorerTimeout { .. } => "ANALYSIS_SCORER_TIMEOUT".to_string(),
            AnalysisError::ScorerUnavailable { .. } => "ANALYSIS_SCORER_UNAVAILABLE".to_string(),
            AnalysisError::ExtractorTimeout { .. } => "ANALYSIS_EXTRACTOR_TIMEOUT".to_string(),
            AnalysisError::ExtractorUnavailable { .. } => {
                "ANALYSIS_EXTRACTOR_UNAVAILABLE".to_string()
            }
        }
    }
}

impl ErrorExt for QueueError {
    fn log_error(&self) -> &Self {
        error!("QueueError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("QueueError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueueError::ConnectionFailed { .. } | QueueError::PopFailed { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            QueueError::ConnectionFailed { .. } => Some(Duration::from_secs(2)),
            QueueError::PopFailed { .. } => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            QueueError::ConnectionFailed { url, .. } => {
                format!("Cannot reach the queue at {}. Is Redis running?", url)
            }
            QueueError::PopFailed { queue, .. } => {
                format!("Reading from queue '{}' failed. Retrying.", queue)
            }
            QueueError::InvalidEncoding => "A queue entry was not valid UTF-8.".to_string(),
            QueueError::Closed => "The queue was closed.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            QueueError::ConnectionFailed { .. } => "QUEUE_CONNECTION_FAILED".to_string(),
            QueueError::PopFailed { .. } => "QUEUE_POP_FAILED".to_string(),
            QueueError::InvalidEncoding => "QUEUE_INVALID_ENCODING".to_string(),
            QueueError::Closed => "QUEUE_CLOSED".to_string(),
        }
    }
}

impl ErrorExt for SinkError {
    fn log_error(&self) -> &Self {
        error!("SinkError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("SinkError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            SinkError::Unavailable { .. } => true,
            SinkError::Rejected { status_code } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SinkError::Rejected { status_code: 429 } => Some(Duration::from_secs(5)),
            _ if self.is_retryable() => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SinkError::Unavailable { endpoint, .. } => {
                format!("Search cluster at {} is unavailable.", endpoint)
            }
            SinkError::Rejected { status_code } => {
                format!("Search cluster rejected the bulk write (HTTP {}).", status_code)
            }
            SinkError::BatchDropped { documents, .. } => {
                format!("{} documents could not be indexed and were dropped.", documents)
            }
            SinkError::PermanentlyUnreachable { .. } => {
                "Search cluster is permanently unreachable. Stopping.".to_string()
            }
            _ => "Indexing error occurred.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            SinkError::Unavailable { .. } => "SINK_UNAVAILABLE".to_string(),
            SinkError::Rejected { .. } => "SINK_REJECTED".to_string(),
            SinkError::InvalidResponse { .. } => "SINK_INVALID_RESPONSE".to_string(),
            SinkError::BatchDropped { .. } => "SINK_BATCH_DROPPED".to_string(),
            SinkError::PermanentlyUnreachable { .. } => "SINK_UNREACHABLE".to_string(),
            SinkError::CircuitOpen => "SINK_CIRCUIT_OPEN".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors need a restart with fixed settings
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::UnknownFilterMode { mode } => format!(
                "Filter mode '{}' is not defined. Use strict, balanced, permissive or a configured mode.",
                mode
            ),
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::UnknownFilterMode { .. } => "CONFIG_UNKNOWN_FILTER_MODE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
            if error.is_retryable() {
                if let Some(retry_after) = error.retry_after() {
                    info!("Error is retryable. Retry after: {:?}", retry_after);
                }
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
