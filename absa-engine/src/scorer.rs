use crate::{EmotionScorer, SentimentScorer, ToneScorer, TopicScorer};
use absa_core::{AnalysisError, AppConfig, ConfigError, ScoreResult, ScorerKind};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Default number of whitespace tokens a scorer looks at.
pub const DEFAULT_MAX_TOKENS: usize = 512;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}]+)*|[^\s\p{L}\p{N}\p{P}\p{M}]").unwrap());

/// A stateless scoring capability. Implementations must be safe to call
/// concurrently for the same post.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn kind(&self) -> ScorerKind;

    async fn score(&self, text: &str, aspects: &[String]) -> Result<ScoreResult, AnalysisError>;
}

/// Prefix of `text` holding at most `max_tokens` whitespace tokens.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> &str {
    if max_tokens == 0 {
        return "";
    }
    let mut seen = 0;
    let mut in_token = false;
    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_token {
                in_token = false;
                if seen == max_tokens {
                    return &text[..idx];
                }
            }
        } else if !in_token {
            in_token = true;
            seen += 1;
        }
    }
    text
}

/// Lowercased words and symbol characters (emoji), punctuation dropped.
pub(crate) fn words(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// The four lexicon scorers, configured from `config`.
pub fn default_scorers(config: &AppConfig) -> Result<Vec<Arc<dyn Scorer>>, ConfigError> {
    let max_tokens = config.worker.max_tokens;
    Ok(vec![
        Arc::new(SentimentScorer::new(max_tokens)) as Arc<dyn Scorer>,
        Arc::new(EmotionScorer::new(max_tokens)),
        Arc::new(ToneScorer::from_config(&config.tone, max_tokens)?),
        Arc::new(TopicScorer::new(max_tokens)),
    ])
}
