//! Text analysis for the worker: aspect extraction, candidate filtering and
//! the lexicon scorers.

pub mod emotion;
pub mod extractor;
pub mod filter;
pub mod lexicon;
pub mod scorer;
pub mod sentiment;
pub mod tone;
pub mod topic;

pub use emotion::EmotionScorer;
pub use extractor::{
    normalize_language, AspectExtractor, CandidateStream, LexicalAspectExtractor,
    SUPPORTED_LANGUAGES,
};
pub use filter::FilterOutcome;
pub use scorer::{default_scorers, truncate_tokens, Scorer, DEFAULT_MAX_TOKENS};
pub use sentiment::SentimentScorer;
pub use tone::{tone_label, ToneScorer, CRITICAL_THRESHOLD, QUESTIONING_THRESHOLD, SKEPTICAL_THRESHOLD};
pub use topic::TopicScorer;
