use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Operation timeout after {millis} ms")]
    Timeout { millis: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    pub fn missing_field(field: &str) -> Self {
        CoreError::MalformedInput {
            reason: format!("missing required field '{}'", field),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("No linguistic model for language '{language}'")]
    UnsupportedLanguage { language: String },

    #[error("Scorer {scorer} timed out after {timeout_ms} ms")]
    ScorerTimeout { scorer: String, timeout_ms: u64 },

    #[error("Scorer {scorer} unavailable: {reason}")]
    ScorerUnavailable { scorer: String, reason: String },

    #[error("Aspect extraction timed out after {timeout_ms} ms")]
    ExtractorTimeout { timeout_ms: u64 },

    #[error("Aspect extractor unavailable: {reason}")]
    ExtractorUnavailable { reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Connection to {url} failed: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Pop from queue '{queue}' failed: {reason}")]
    PopFailed { queue: String, reason: String },

    #[error("Payload is not valid UTF-8")]
    InvalidEncoding,

    #[error("Queue closed")]
    Closed,
}

#[derive(Error, Debug, Clone)]
pub enum SinkError {
    #[error("Sink unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },

    #[error("Sink rejected request with status {status_code}")]
    Rejected { status_code: u16 },

    #[error("Invalid sink response: {details}")]
    InvalidResponse { details: String },

    #[error("Batch of {documents} documents dropped after {attempts} attempts")]
    BatchDropped { documents: usize, attempts: u32 },

    #[error("Sink unreachable after {consecutive_failures} consecutive failed batches")]
    PermanentlyUnreachable { consecutive_failures: u32 },

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Unknown filter mode: {mode}")]
    UnknownFilterMode { mode: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
