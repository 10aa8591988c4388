//! Builds the indexed document from a post and its analysis.

use absa_core::{
    AnalyzedDocument, RawPost, ScoreResult, ScorerKind, SentimentLabel, ToneLabel,
};
use chrono::{DateTime, Utc};

/// Tone confidence above which a positive post reads as ironic.
pub const IRONY_TONE_CONFIDENCE: f64 = 0.7;
const MAX_FLAT_EMOTIONS: usize = 3;

/// Everything the pipeline learned about one post.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub aspects: Vec<String>,
    pub scores: Vec<ScoreResult>,
    pub absent: Vec<ScorerKind>,
    pub filter_mode: String,
    pub processing_ms: u64,
    pub ingested_at: DateTime<Utc>,
}

pub fn assemble(post: RawPost, analysis: Analysis, max_text_chars: usize) -> AnalyzedDocument {
    let mut slots: [Option<ScoreResult>; 4] = Default::default();
    for result in analysis.scores {
        let idx = slot_index(result.kind);
        slots[idx] = Some(result);
    }
    let [mut sentiment, emotion, tone, topic] = slots;

    if let (Some(sentiment), Some(tone)) = (sentiment.as_mut(), tone.as_ref()) {
        relabel_irony(sentiment, tone);
    }

    let aspect_sentiments = sentiment
        .as_ref()
        .map(|s| s.aspects.clone())
        .unwrap_or_default();
    let emotions_flat = emotion.as_ref().map(flatten_emotions).unwrap_or_default();

    let mut absent = analysis.absent;
    absent.sort_by_key(|kind| slot_index(*kind));
    absent.dedup();

    let score = post.score();
    AnalyzedDocument {
        text: truncate_chars(&post.text, max_text_chars),
        id: post.id,
        title: post.title,
        author: post.author,
        author_username: post.author_username,
        instance: post.instance,
        language: post.language,
        created_at: post.created_at,
        url: post.url,
        hashtags: post.hashtags,
        favourites: post.favourites,
        reblogs: post.reblogs,
        replies: post.replies,
        score,
        aspects: analysis.aspects,
        aspect_sentiments,
        sentiment,
        emotion,
        emotions_flat,
        tone,
        topic,
        absent_scorers: absent,
        filter_mode: analysis.filter_mode,
        processing_ms: analysis.processing_ms,
        ingested_at: analysis.ingested_at,
    }
}

fn slot_index(kind: ScorerKind) -> usize {
    match kind {
        ScorerKind::Sentiment => 0,
        ScorerKind::Emotion => 1,
        ScorerKind::Tone => 2,
        ScorerKind::Topic => 3,
    }
}

/// Positive wording in a clearly critical post is read as irony.
fn relabel_irony(sentiment: &mut ScoreResult, tone: &ScoreResult) {
    if sentiment.label == SentimentLabel::Positive.as_str()
        && tone.label == ToneLabel::Critical.as_str()
        && tone.confidence >= IRONY_TONE_CONFIDENCE
    {
        sentiment.label = SentimentLabel::CriticalIronic.as_str().to_string();
    }
}

/// Top emotion followed by its runners-up.
fn flatten_emotions(emotion: &ScoreResult) -> Vec<String> {
    std::iter::once(emotion.label.clone())
        .chain(emotion.secondary.iter().map(|s| s.label.clone()))
        .take(MAX_FLAT_EMOTIONS)
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
