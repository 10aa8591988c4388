//! Critical-tone detection.
//!
//! A base score comes from the critique lexicon (metaphors, keywords, emoji).
//! Configured marker patterns then nudge it: critical markers add their
//! weight freely, skeptical markers add theirs but cannot lift a score across
//! the critical threshold by themselves. The result always stays in [0, 1].

use crate::scorer::{truncate_tokens, Scorer, DEFAULT_MAX_TOKENS};
use absa_core::{
    AnalysisError, ConfigError, MarkerPattern, ScoreResult, ScorerKind, ToneConfig, ToneLabel,
};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

pub const CRITICAL_THRESHOLD: f64 = 0.65;
pub const SKEPTICAL_THRESHOLD: f64 = 0.45;
pub const QUESTIONING_THRESHOLD: f64 = 0.25;

const METAPHORS: &[&str] = &[
    "surveillance capitalism",
    "gig economy",
    "capitalisme de surveillance",
    "ubérisation",
];
const CRITIQUE_WORDS: &[&str] = &[
    "exploitation",
    "precarious",
    "inequality",
    "unfair",
    "exploité",
    "précaire",
    "inégalité",
    "injustice",
];
const CRITIQUE_EMOJI: &[&str] = &["🙄", "😒", "😤", "😠", "😡", "🚩", "⚠️", "❌"];

struct Marker {
    pattern: Regex,
    source: String,
    weight: f64,
}

impl Marker {
    fn compile(marker: &MarkerPattern) -> Result<Self, ConfigError> {
        let pattern = RegexBuilder::new(&marker.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|_| ConfigError::InvalidValue {
                field: "tone marker pattern".to_string(),
                value: marker.pattern.clone(),
            })?;
        Ok(Self {
            pattern,
            source: marker.pattern.clone(),
            weight: marker.weight,
        })
    }
}

pub fn tone_label(score: f64) -> ToneLabel {
    if score >= CRITICAL_THRESHOLD {
        ToneLabel::Critical
    } else if score >= SKEPTICAL_THRESHOLD {
        ToneLabel::Skeptical
    } else if score >= QUESTIONING_THRESHOLD {
        ToneLabel::Questioning
    } else {
        ToneLabel::Neutral
    }
}

pub struct ToneScorer {
    critical: Vec<Marker>,
    skeptical: Vec<Marker>,
    max_tokens: usize,
}

impl ToneScorer {
    pub fn from_config(config: &ToneConfig, max_tokens: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            critical: config
                .critical_markers
                .iter()
                .map(Marker::compile)
                .collect::<Result<_, _>>()?,
            skeptical: config
                .skeptical_markers
                .iter()
                .map(Marker::compile)
                .collect::<Result<_, _>>()?,
            max_tokens,
        })
    }

    /// Score in [0, 1] plus the signals that fired.
    pub fn analyze(&self, text: &str) -> (f64, Vec<String>) {
        let lower = text.to_lowercase();
        let mut score = 0.0;
        let mut signals = Vec::new();

        if let Some(metaphor) = METAPHORS.iter().find(|m| lower.contains(*m)) {
            score += 0.4;
            signals.push(format!("metaphor:{}", metaphor));
        }

        let keywords = CRITIQUE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        if keywords > 0 {
            score += f64::min(0.5, 0.15 * keywords as f64);
            signals.push(format!("keywords:{}", keywords));
        }

        let emoji: usize = CRITIQUE_EMOJI.iter().map(|e| text.matches(e).count()).sum();
        if emoji > 0 {
            score += f64::min(0.3, 0.1 * emoji as f64);
            signals.push(format!("emoji:{}", emoji));
        }

        for marker in &self.critical {
            if marker.pattern.is_match(text) {
                score += marker.weight;
                signals.push(format!("critical_marker:{}", marker.source));
            }
        }

        // Skeptical phrasing alone never makes a post critical.
        let ceiling = if score >= CRITICAL_THRESHOLD {
            1.0
        } else {
            CRITICAL_THRESHOLD - 0.01
        };
        for marker in &self.skeptical {
            if marker.pattern.is_match(text) {
                score = f64::max(score, f64::min(score + marker.weight, ceiling));
                signals.push(format!("skeptical_marker:{}", marker.source));
            }
        }

        (score.clamp(0.0, 1.0), signals)
    }
}

impl Default for ToneScorer {
    fn default() -> Self {
        // The built-in markers are known-good patterns.
        Self::from_config(&ToneConfig::default(), DEFAULT_MAX_TOKENS).unwrap_or(Self {
            critical: Vec::new(),
            skeptical: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }
}

#[async_trait]
impl Scorer for ToneScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Tone
    }

    async fn score(&self, text: &str, _aspects: &[String]) -> Result<ScoreResult, AnalysisError> {
        let (score, signals) = self.analyze(truncate_tokens(text, self.max_tokens));
        let label = tone_label(score);
        let confidence = match label {
            ToneLabel::Neutral => 1.0 - score,
            _ => score,
        };
        Ok(ScoreResult::new(ScorerKind::Tone, label.as_str(), confidence).with_signals(signals))
    }
}
