use crate::scorer::{truncate_tokens, words, Scorer, DEFAULT_MAX_TOKENS};
use absa_core::{AnalysisError, EmotionLabel, LabelScore, ScoreResult, ScorerKind};
use async_trait::async_trait;
use std::collections::HashMap;

/// Runner-up labels below this share are not reported.
const SECONDARY_MIN_SHARE: f64 = 0.1;
const MAX_SECONDARY: usize = 3;

pub struct EmotionScorer {
    cues: HashMap<&'static str, EmotionLabel>,
    max_tokens: usize,
}

impl EmotionScorer {
    pub fn new(max_tokens: usize) -> Self {
        let table: &[(EmotionLabel, &[&'static str])] = &[
            (
                EmotionLabel::Joy,
                &[
                    "happy", "joy", "love", "glad", "excited", "wonderful", "great", "delighted",
                    "yay", "heureux", "heureuse", "joie", "content", "ravi", "génial", "adore",
                    "😀", "😃", "😊", "😂", "😍", "🥰", "🎉", "❤",
                ],
            ),
            (
                EmotionLabel::Sadness,
                &[
                    "sad", "unhappy", "miss", "lonely", "cry", "crying", "depressed", "grief",
                    "heartbroken", "triste", "pleure", "déçu", "déçue", "chagrin", "😢", "😭",
                    "💔",
                ],
            ),
            (
                EmotionLabel::Anger,
                &[
                    "angry", "furious", "hate", "outrage", "outraged", "rage", "unfair", "mad",
                    "colère", "énervé", "furieux", "furieuse", "scandale", "déteste", "injuste",
                    "😠", "😡", "🤬", "😤",
                ],
            ),
            (
                EmotionLabel::Fear,
                &[
                    "afraid", "scared", "fear", "worried", "anxious", "terrifying", "scary",
                    "panic", "peur", "inquiet", "inquiète", "angoisse", "effrayant", "😨", "😱",
                ],
            ),
            (
                EmotionLabel::Surprise,
                &[
                    "wow", "surprised", "unexpected", "shocking", "incredible", "unbelievable",
                    "omg", "surpris", "surprise", "incroyable", "étonnant", "😮", "😲", "🤯",
                ],
            ),
            (
                EmotionLabel::Disgust,
                &[
                    "disgusting", "gross", "revolting", "nasty", "yuck", "dégoûtant",
                    "écœurant", "beurk", "🤢", "🤮",
                ],
            ),
        ];

        let mut cues = HashMap::new();
        for (label, words) in table {
            for word in *words {
                cues.entry(*word).or_insert(*label);
            }
        }

        Self { cues, max_tokens }
    }

    /// Hit count per label, in `EmotionLabel::ALL` order.
    fn counts(&self, text: &str) -> Vec<(EmotionLabel, usize)> {
        let mut hits: HashMap<EmotionLabel, usize> = HashMap::new();
        for token in words(text) {
            if let Some(label) = self.cues.get(token.as_str()) {
                *hits.entry(*label).or_insert(0) += 1;
            }
        }
        EmotionLabel::ALL
            .iter()
            .filter_map(|label| hits.get(label).map(|n| (*label, *n)))
            .collect()
    }
}

impl Default for EmotionScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

#[async_trait]
impl Scorer for EmotionScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Emotion
    }

    async fn score(&self, text: &str, _aspects: &[String]) -> Result<ScoreResult, AnalysisError> {
        let mut counts = self.counts(truncate_tokens(text, self.max_tokens));
        let total: usize = counts.iter().map(|(_, n)| n).sum();
        if total == 0 {
            return Ok(ScoreResult::new(
                ScorerKind::Emotion,
                EmotionLabel::Neutral.as_str(),
                0.5,
            ));
        }

        // Stable sort keeps label order on ties.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let share = |n: usize| n as f64 / total as f64;

        let (top, top_hits) = counts[0];
        let secondary = counts[1..]
            .iter()
            .filter(|(_, n)| share(*n) > SECONDARY_MIN_SHARE)
            .take(MAX_SECONDARY)
            .map(|(label, n)| LabelScore {
                label: label.as_str().to_string(),
                score: share(*n),
            })
            .collect();

        Ok(ScoreResult::new(ScorerKind::Emotion, top.as_str(), share(top_hits))
            .with_secondary(secondary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_neutral_without_cues() {
        let result = EmotionScorer::default().score("", &[]).await.unwrap();
        assert_eq!(result.label, "neutral");
        assert_eq!(result.confidence, 0.5);
        assert!(result.secondary.is_empty());
    }

    #[tokio::test]
    async fn test_top_label_and_secondary() {
        let result = EmotionScorer::default()
            .score("So happy and excited 🎉 but a bit scared", &[])
            .await
            .unwrap();
        assert_eq!(result.label, "joy");
        assert!((result.confidence - 0.75).abs() < 1e-9);
        assert_eq!(result.secondary.len(), 1);
        assert_eq!(result.secondary[0].label, "fear");
    }

    #[tokio::test]
    async fn test_french_cues() {
        let result = EmotionScorer::default()
            .score("J'ai peur, vraiment peur 😱", &[])
            .await
            .unwrap();
        assert_eq!(result.label, "fear");
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_tie_prefers_label_order() {
        let result = EmotionScorer::default()
            .score("sad but angry", &[])
            .await
            .unwrap();
        assert_eq!(result.label, "sadness");
        assert_eq!(result.secondary[0].label, "anger");
    }
}
