//! Polarity scoring with negation and intensifier handling.

use crate::scorer::{truncate_tokens, words, Scorer, DEFAULT_MAX_TOKENS};
use absa_core::{AnalysisError, AspectScore, ScoreResult, ScorerKind, SentimentLabel};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Scores inside this band around zero read as neutral.
const NEUTRAL_BAND: f64 = 0.05;
/// How many following tokens a negation word can reach.
const NEGATION_WINDOW: usize = 3;

pub struct PolarityLexicon {
    words: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for PolarityLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityLexicon {
    pub fn new() -> Self {
        let scored: &[(&str, f64)] = &[
            // English, positive
            ("love", 0.8),
            ("loves", 0.8),
            ("loved", 0.8),
            ("like", 0.4),
            ("great", 0.7),
            ("good", 0.5),
            ("excellent", 0.8),
            ("amazing", 0.8),
            ("awesome", 0.8),
            ("wonderful", 0.8),
            ("fantastic", 0.8),
            ("brilliant", 0.7),
            ("perfect", 0.7),
            ("happy", 0.6),
            ("glad", 0.5),
            ("excited", 0.6),
            ("best", 0.7),
            ("better", 0.4),
            ("nice", 0.5),
            ("beautiful", 0.7),
            ("enjoy", 0.6),
            ("thanks", 0.4),
            ("thank", 0.4),
            ("win", 0.5),
            ("success", 0.6),
            ("hope", 0.3),
            ("fun", 0.5),
            ("cool", 0.4),
            ("helpful", 0.5),
            // English, negative
            ("hate", -0.8),
            ("hates", -0.8),
            ("bad", -0.6),
            ("terrible", -0.8),
            ("awful", -0.8),
            ("horrible", -0.8),
            ("worst", -0.8),
            ("worse", -0.5),
            ("sad", -0.6),
            ("angry", -0.6),
            ("poor", -0.4),
            ("fail", -0.5),
            ("failed", -0.5),
            ("failure", -0.6),
            ("wrong", -0.4),
            ("problem", -0.3),
            ("broken", -0.5),
            ("scary", -0.5),
            ("dangerous", -0.5),
            ("unfair", -0.6),
            ("exploitation", -0.6),
            ("precarious", -0.5),
            ("inequality", -0.5),
            ("disgusting", -0.8),
            ("stupid", -0.6),
            ("boring", -0.4),
            ("annoying", -0.5),
            ("crisis", -0.5),
            ("disaster", -0.8),
            ("scam", -0.7),
            ("lies", -0.5),
            // French, positive
            ("aime", 0.7),
            ("aimer", 0.7),
            ("adore", 0.8),
            ("génial", 0.8),
            ("géniale", 0.8),
            ("super", 0.6),
            ("bien", 0.4),
            ("bon", 0.5),
            ("bonne", 0.5),
            ("magnifique", 0.8),
            ("heureux", 0.6),
            ("heureuse", 0.6),
            ("merci", 0.4),
            ("bravo", 0.6),
            ("parfait", 0.7),
            ("content", 0.5),
            ("ravi", 0.6),
            // French, negative
            ("déteste", -0.8),
            ("nul", -0.7),
            ("nulle", -0.7),
            ("mauvais", -0.6),
            ("mauvaise", -0.6),
            ("triste", -0.6),
            ("colère", -0.6),
            ("injuste", -0.6),
            ("injustice", -0.6),
            ("précaire", -0.5),
            ("exploité", -0.6),
            ("inégalité", -0.5),
            ("catastrophe", -0.8),
            ("honte", -0.6),
            ("scandale", -0.6),
            ("problème", -0.3),
            ("pire", -0.7),
            ("arnaque", -0.7),
            // Emoji
            ("😀", 0.6),
            ("😃", 0.6),
            ("😊", 0.6),
            ("😂", 0.5),
            ("😍", 0.8),
            ("🥰", 0.8),
            ("❤", 0.7),
            ("👍", 0.5),
            ("🎉", 0.6),
            ("🙏", 0.3),
            ("😢", -0.6),
            ("😭", -0.6),
            ("😡", -0.7),
            ("😠", -0.6),
            ("👎", -0.5),
            ("💔", -0.6),
            ("🙄", -0.3),
            ("😒", -0.3),
            ("😤", -0.4),
            ("🤮", -0.7),
        ];

        let negations = [
            "not", "no", "never", "nothing", "nobody", "none", "neither", "nor", "cannot",
            "without", "hardly", "barely", "isn't", "aren't", "wasn't", "weren't", "don't",
            "doesn't", "didn't", "won't", "can't", "couldn't", "shouldn't", "wouldn't", "dont",
            "cant", "ne", "n", "pas", "jamais", "rien", "aucun", "aucune", "sans", "ni",
        ];

        let intensifiers: &[(&str, f64)] = &[
            ("very", 1.5),
            ("really", 1.3),
            ("extremely", 2.0),
            ("so", 1.3),
            ("totally", 1.5),
            ("absolutely", 1.6),
            ("slightly", 0.5),
            ("somewhat", 0.7),
            ("très", 1.5),
            ("vraiment", 1.3),
            ("trop", 1.4),
            ("tellement", 1.5),
            ("extrêmement", 2.0),
            ("assez", 0.8),
        ];

        Self {
            words: scored.iter().copied().collect(),
            negations: negations.into_iter().collect(),
            intensifiers: intensifiers.iter().copied().collect(),
        }
    }

    fn knows(&self, token: &str) -> bool {
        self.words.contains_key(token)
            || self.negations.contains(token)
            || self.intensifiers.contains_key(token)
    }

    /// Split elided forms ("n'aime") unless the whole token is known.
    fn expand<'a>(&self, token: &'a str) -> Vec<&'a str> {
        if self.knows(token) || !token.contains(['\'', '’']) {
            vec![token]
        } else {
            token
                .split(['\'', '’'])
                .filter(|part| !part.is_empty())
                .collect()
        }
    }

    /// Mean polarity in [-1, 1] and the number of scored words.
    pub fn analyze(&self, text: &str) -> (f64, usize) {
        let tokens = words(text);
        let mut scores = Vec::new();
        let mut negation_left = 0usize;
        let mut intensifier = 1.0;

        for token in tokens.iter().flat_map(|t| self.expand(t)) {
            if self.negations.contains(token) {
                negation_left = NEGATION_WINDOW;
                continue;
            }
            if let Some(mult) = self.intensifiers.get(token) {
                intensifier = *mult;
                continue;
            }
            if let Some(score) = self.words.get(token) {
                let mut score = *score * intensifier;
                if negation_left > 0 {
                    score = -score;
                    negation_left = 0;
                }
                intensifier = 1.0;
                scores.push(score.clamp(-1.0, 1.0));
            } else {
                negation_left = negation_left.saturating_sub(1);
                intensifier = 1.0;
            }
        }

        if scores.is_empty() {
            (0.0, 0)
        } else {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            (mean.clamp(-1.0, 1.0), scores.len())
        }
    }
}

/// Label and confidence for a mean polarity.
fn classify(score: f64, hits: usize) -> (SentimentLabel, f64) {
    if hits == 0 {
        (SentimentLabel::Neutral, 0.5)
    } else if score > NEUTRAL_BAND {
        (SentimentLabel::Positive, 0.5 + score.abs() / 2.0)
    } else if score < -NEUTRAL_BAND {
        (SentimentLabel::Negative, 0.5 + score.abs() / 2.0)
    } else {
        (SentimentLabel::Neutral, 0.6)
    }
}

pub struct SentimentScorer {
    lexicon: PolarityLexicon,
    max_tokens: usize,
}

impl SentimentScorer {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            lexicon: PolarityLexicon::new(),
            max_tokens,
        }
    }

    fn aspect_score(&self, text: &str, aspect: &str) -> AspectScore {
        let mentioning: Vec<&str> = text
            .split(['.', '!', '?', '\n'])
            .filter(|sentence| words(sentence).iter().any(|w| w == aspect))
            .collect();

        let (score, hits) = if mentioning.is_empty() {
            self.lexicon.analyze(text)
        } else {
            self.lexicon.analyze(&mentioning.join(" "))
        };
        let (label, confidence) = classify(score, hits);

        AspectScore {
            aspect: aspect.to_string(),
            label: label.as_str().to_string(),
            confidence,
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

#[async_trait]
impl Scorer for SentimentScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Sentiment
    }

    async fn score(&self, text: &str, aspects: &[String]) -> Result<ScoreResult, AnalysisError> {
        let text = truncate_tokens(text, self.max_tokens);
        let (score, hits) = self.lexicon.analyze(text);
        let (label, confidence) = classify(score, hits);

        let per_aspect = aspects
            .iter()
            .map(|aspect| self.aspect_score(text, &aspect.to_lowercase()))
            .collect();

        Ok(ScoreResult::new(ScorerKind::Sentiment, label.as_str(), confidence).with_aspects(per_aspect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn score(text: &str) -> ScoreResult {
        SentimentScorer::default().score(text, &[]).await.unwrap()
    }

    #[tokio::test]
    async fn test_positive_scenario() {
        let scorer = SentimentScorer::default();
        let aspects = vec!["ai".to_string(), "morocco".to_string()];
        let result = scorer
            .score("I love AI in Morocco! #Morocco #AI", &aspects)
            .await
            .unwrap();
        assert_eq!(result.label, "positive");
        assert!(result.confidence > 0.5);
        assert_eq!(result.aspects.len(), 2);
        assert!(result.aspects.iter().all(|a| a.label == "positive"));
    }

    #[tokio::test]
    async fn test_negation_flips() {
        assert_eq!(score("This is not good").await.label, "negative");
        assert_eq!(score("Je n'aime pas ça").await.label, "negative");
        assert_eq!(score("I don't hate it").await.label, "positive");
    }

    #[tokio::test]
    async fn test_empty_and_unscored_text_is_neutral() {
        let empty = score("").await;
        assert_eq!(empty.label, "neutral");
        assert_eq!(empty.confidence, 0.5);
        assert_eq!(score("The train leaves at noon").await.label, "neutral");
    }

    #[tokio::test]
    async fn test_intensifier_raises_confidence() {
        let plain = score("good").await;
        let boosted = score("very good").await;
        assert!(boosted.confidence > plain.confidence);
    }

    #[tokio::test]
    async fn test_aspect_uses_its_own_sentence() {
        let scorer = SentimentScorer::default();
        let aspects = vec!["coffee".to_string(), "service".to_string()];
        let result = scorer
            .score("The coffee was great. The service was terrible.", &aspects)
            .await
            .unwrap();
        assert_eq!(result.aspects[0].label, "positive");
        assert_eq!(result.aspects[1].label, "negative");
    }

    #[tokio::test]
    async fn test_emoji_polarity() {
        assert_eq!(score("Launch day 🎉🎉").await.label, "positive");
        assert_eq!(score("Launch day 💔").await.label, "negative");
    }
}
