//! Worker configuration: TOML file, then environment overrides, then
//! validation. CLI flags are layered on top by the binary.

use crate::filter_mode::{FilterMode, FilterModeDefinition, FilterModeTable, BALANCED};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub tone: ToneConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    /// Seconds a single BLPOP may block before the loop checks for shutdown.
    #[serde(default = "default_pop_timeout_secs")]
    pub pop_timeout_secs: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_queue_name() -> String {
    "mastodon_queue".to_string()
}

fn default_pop_timeout_secs() -> u64 {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            queue_name: default_queue_name(),
            pop_timeout_secs: default_pop_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Elasticsearch,
    Jsonl,
}

impl std::str::FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elasticsearch" | "es" => Ok(SinkKind::Elasticsearch),
            "jsonl" => Ok(SinkKind::Jsonl),
            other => Err(ConfigError::InvalidValue {
                field: "sink.kind".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,
    #[serde(default = "default_es_host")]
    pub es_host: String,
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    #[serde(default)]
    pub jsonl_path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Attempts per batch, including the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Dropped batches in a row before the sink is declared unreachable.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_es_host() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_prefix() -> String {
    "mastodon-trends".to_string()
}

fn default_batch_size() -> usize {
    20
}

fn default_flush_interval_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    600
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            es_host: default_es_host(),
            index_prefix: default_index_prefix(),
            jsonl_path: None,
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SinkConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_filter_mode")]
    pub filter_mode: String,
    /// Used when a post's language code is blank after normalization.
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_extractor_timeout_ms")]
    pub extractor_timeout_ms: u64,
    #[serde(default = "default_scorer_timeout_ms")]
    pub scorer_timeout_ms: u64,
    /// Whitespace tokens handed to each scorer; the rest is truncated.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Log a stats snapshot every N processed posts.
    #[serde(default = "default_stats_every")]
    pub stats_every: u64,
    /// Characters of post text kept in the indexed document.
    #[serde(default = "default_max_document_text_chars")]
    pub max_document_text_chars: usize,
}

fn default_filter_mode() -> String {
    BALANCED.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_extractor_timeout_ms() -> u64 {
    500
}

fn default_scorer_timeout_ms() -> u64 {
    2000
}

fn default_max_tokens() -> usize {
    512
}

fn default_stats_every() -> u64 {
    20
}

fn default_max_document_text_chars() -> usize {
    500
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            filter_mode: default_filter_mode(),
            default_language: default_language(),
            extractor_timeout_ms: default_extractor_timeout_ms(),
            scorer_timeout_ms: default_scorer_timeout_ms(),
            max_tokens: default_max_tokens(),
            stats_every: default_stats_every(),
            max_document_text_chars: default_max_document_text_chars(),
        }
    }
}

impl WorkerConfig {
    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_millis(self.extractor_timeout_ms)
    }

    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.scorer_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Extra modes, keyed by name. A key equal to a built-in name replaces it.
    #[serde(default)]
    pub modes: BTreeMap<String, FilterModeDefinition>,
}

/// A case-insensitive regex and the amount it nudges the tone score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPattern {
    pub pattern: String,
    pub weight: f64,
}

impl MarkerPattern {
    pub fn new(pattern: &str, weight: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneConfig {
    #[serde(default = "default_critical_markers")]
    pub critical_markers: Vec<MarkerPattern>,
    #[serde(default = "default_skeptical_markers")]
    pub skeptical_markers: Vec<MarkerPattern>,
}

fn default_critical_markers() -> Vec<MarkerPattern> {
    vec![
        MarkerPattern::new(r"\bso[- ]called\b", 0.2),
        MarkerPattern::new(r"\byeah,? right\b", 0.25),
        MarkerPattern::new(r"\bwhat could (possibly )?go wrong\b", 0.3),
        MarkerPattern::new(r"\bsoi[- ]disant\b", 0.2),
        MarkerPattern::new(r"\bcomme par hasard\b", 0.25),
        MarkerPattern::new(r"\bbien sûr,? bien sûr\b", 0.2),
    ]
}

fn default_skeptical_markers() -> Vec<MarkerPattern> {
    vec![
        MarkerPattern::new(r"\b(allegedly|supposedly|apparently)\b", 0.15),
        MarkerPattern::new(r"\bi (doubt|wonder)\b", 0.15),
        MarkerPattern::new(r"\bnot (so )?sure\b", 0.1),
        MarkerPattern::new(r"\b(prétendument|apparemment)\b", 0.15),
        MarkerPattern::new(r"\bje doute\b", 0.15),
        MarkerPattern::new(r"\?\s*$", 0.1),
    ]
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            critical_markers: default_critical_markers(),
            skeptical_markers: default_skeptical_markers(),
        }
    }
}

impl AppConfig {
    /// Load the config file if given, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Recognised keys: `FILTER_MODE`,
    /// `REDIS_URL`, `QUEUE_NAME` (or `REDIS_QUEUE_NAME`), `BLPOP_TIMEOUT`,
    /// `ES_HOST`, `ES_INDEX_PREFIX`, `MAX_RETRIES`, `RETRY_BASE_SLEEP`
    /// (seconds, fractional).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = get("FILTER_MODE") {
            debug!("FILTER_MODE override: {}", mode);
            self.worker.filter_mode = mode.trim().to_lowercase();
        }
        if let Some(url) = get("REDIS_URL") {
            self.queue.redis_url = url;
        }
        if let Some(name) = get("QUEUE_NAME").or_else(|| get("REDIS_QUEUE_NAME")) {
            self.queue.queue_name = name;
        }
        if let Some(timeout) = get("BLPOP_TIMEOUT") {
            self.queue.pop_timeout_secs = parse_number("BLPOP_TIMEOUT", &timeout)?;
        }
        if let Some(host) = get("ES_HOST") {
            self.sink.es_host = host;
        }
        if let Some(prefix) = get("ES_INDEX_PREFIX") {
            self.sink.index_prefix = prefix;
        }
        if let Some(retries) = get("MAX_RETRIES") {
            self.sink.max_retries = parse_number("MAX_RETRIES", &retries)?;
        }
        if let Some(sleep) = get("RETRY_BASE_SLEEP") {
            let seconds: f64 = parse_number("RETRY_BASE_SLEEP", &sleep)?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "RETRY_BASE_SLEEP".to_string(),
                    value: sleep,
                });
            }
            self.sink.retry_base_delay_ms = (seconds * 1000.0).round() as u64;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter_mode()?;

        if self.queue.queue_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "queue name must not be empty".to_string(),
            });
        }
        if self.queue.pop_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "pop timeout must be at least one second".to_string(),
            });
        }
        if self.sink.batch_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "batch size must be greater than zero".to_string(),
            });
        }
        if self.sink.flush_interval_ms == 0 || self.sink.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "sink timeouts must be greater than zero".to_string(),
            });
        }
        if self.sink.max_retries == 0 || self.sink.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "retry limits must be greater than zero".to_string(),
            });
        }
        if self.worker.extractor_timeout_ms == 0 || self.worker.scorer_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "analysis timeouts must be greater than zero".to_string(),
            });
        }
        if self.worker.max_tokens == 0 || self.worker.stats_every == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "max_tokens and stats_every must be greater than zero".to_string(),
            });
        }

        match self.sink.kind {
            SinkKind::Elasticsearch => {
                url::Url::parse(&self.sink.es_host).map_err(|_| ConfigError::InvalidValue {
                    field: "sink.es_host".to_string(),
                    value: self.sink.es_host.clone(),
                })?;
                if self.sink.index_prefix.trim().is_empty() {
                    return Err(ConfigError::ValidationFailed {
                        reason: "index prefix must not be empty".to_string(),
                    });
                }
            }
            SinkKind::Jsonl => {
                if self.sink.jsonl_path.is_none() {
                    return Err(ConfigError::ValidationFailed {
                        reason: "the jsonl sink needs sink.jsonl_path".to_string(),
                    });
                }
            }
        }

        for marker in self
            .tone
            .critical_markers
            .iter()
            .chain(self.tone.skeptical_markers.iter())
        {
            if !marker.weight.is_finite() || marker.weight < 0.0 || marker.weight > 1.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("tone marker '{}' weight", marker.pattern),
                    value: marker.weight.to_string(),
                });
            }
        }

        Ok(())
    }

    /// The single filter mode this process runs with.
    pub fn filter_mode(&self) -> Result<FilterMode, ConfigError> {
        FilterModeTable::with_definitions(&self.filter.modes)?.get(&self.worker.filter_mode)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}
