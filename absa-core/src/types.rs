use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A post as delivered by the producer, validated and immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPost {
    pub id: String,
    pub text: String,
    pub author: String,
    pub author_username: Option<String>,
    pub title: Option<String>,
    pub instance: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub hashtags: Vec<String>,
    pub favourites: u64,
    pub reblogs: u64,
    pub replies: u64,
    pub url: String,
}

impl RawPost {
    /// Engagement score, always favourites + reblogs.
    pub fn score(&self) -> u64 {
        self.favourites + self.reblogs
    }

    /// Parse a queue payload into a validated post.
    pub fn from_json(payload: &str) -> Result<Self, CoreError> {
        let wire: WirePost = serde_json::from_str(payload).map_err(|e| CoreError::MalformedInput {
            reason: format!("invalid JSON payload: {}", e),
        })?;
        RawPost::try_from(wire)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(u64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        }
    }
}

/// Lenient wire shape accepted from the queue. Every producer variant seen in
/// the wild is covered by the aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WirePost {
    #[serde(default, alias = "toot_id", alias = "post_id", alias = "tweet_id")]
    id: Option<WireId>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "author_id")]
    author: Option<WireId>,
    #[serde(default)]
    author_username: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    #[serde(default, alias = "lang")]
    language: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    hashtags: Option<Vec<String>>,
    #[serde(default, alias = "favourites_count")]
    favourites: Option<u64>,
    #[serde(default, alias = "reblogs_count")]
    reblogs: Option<u64>,
    #[serde(default, alias = "replies_count")]
    replies: Option<u64>,
    #[serde(default)]
    score: Option<u64>,
    #[serde(default)]
    url: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, CoreError> {
    value.ok_or_else(|| CoreError::missing_field(field))
}

fn non_blank(value: Option<String>, field: &str) -> Result<String, CoreError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(CoreError::missing_field(field)),
    }
}

impl TryFrom<WirePost> for RawPost {
    type Error = CoreError;

    fn try_from(wire: WirePost) -> Result<Self, Self::Error> {
        let id = required(wire.id, "id")?.into_string();
        if id.trim().is_empty() {
            return Err(CoreError::missing_field("id"));
        }
        // Text may legitimately be empty, but it has to be present.
        let text = required(wire.text, "text")?;
        let author = required(wire.author, "author")?.into_string();
        let instance = non_blank(wire.instance, "instance")?;
        let language = non_blank(wire.language, "language")?;

        let created_raw = non_blank(wire.created_at, "created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_raw)
            .map_err(|e| CoreError::MalformedInput {
                reason: format!("created_at '{}' is not ISO-8601: {}", created_raw, e),
            })?
            .with_timezone(&Utc);

        let url = non_blank(wire.url, "url")?;
        url::Url::parse(&url).map_err(|e| CoreError::MalformedInput {
            reason: format!("url '{}' is invalid: {}", url, e),
        })?;

        // An empty list is still present.
        let hashtags = required(wire.hashtags, "hashtags")?
            .into_iter()
            .map(|tag| tag.trim_start_matches('#').to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        let post = RawPost {
            id,
            text,
            author,
            author_username: wire.author_username,
            title: wire.title,
            instance,
            language,
            created_at,
            hashtags,
            favourites: required(wire.favourites, "favourites")?,
            reblogs: required(wire.reblogs, "reblogs")?,
            replies: required(wire.replies, "replies")?,
            url,
        };

        let score = required(wire.score, "score")?;
        if score != post.score() {
            debug!(
                "Post {} carries score {} but favourites + reblogs = {}; using derived value",
                post.id,
                score,
                post.score()
            );
        }

        Ok(post)
    }
}

/// Universal part-of-speech tags produced by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PosTag {
    Noun,
    Propn,
    Adj,
    Verb,
    Adv,
    Pron,
    Det,
    Adp,
    Aux,
    Cconj,
    Sconj,
    Part,
    Intj,
    Num,
    Punct,
    Sym,
    X,
}

impl PosTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosTag::Noun => "NOUN",
            PosTag::Propn => "PROPN",
            PosTag::Adj => "ADJ",
            PosTag::Verb => "VERB",
            PosTag::Adv => "ADV",
            PosTag::Pron => "PRON",
            PosTag::Det => "DET",
            PosTag::Adp => "ADP",
            PosTag::Aux => "AUX",
            PosTag::Cconj => "CCONJ",
            PosTag::Sconj => "SCONJ",
            PosTag::Part => "PART",
            PosTag::Intj => "INTJ",
            PosTag::Num => "NUM",
            PosTag::Punct => "PUNCT",
            PosTag::Sym => "SYM",
            PosTag::X => "X",
        }
    }
}

impl fmt::Display for PosTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s.to_ascii_uppercase().as_str() {
            "NOUN" => PosTag::Noun,
            "PROPN" => PosTag::Propn,
            "ADJ" => PosTag::Adj,
            "VERB" => PosTag::Verb,
            "ADV" => PosTag::Adv,
            "PRON" => PosTag::Pron,
            "DET" => PosTag::Det,
            "ADP" => PosTag::Adp,
            "AUX" => PosTag::Aux,
            "CCONJ" => PosTag::Cconj,
            "SCONJ" => PosTag::Sconj,
            "PART" => PosTag::Part,
            "INTJ" => PosTag::Intj,
            "NUM" => PosTag::Num,
            "PUNCT" => PosTag::Punct,
            "SYM" => PosTag::Sym,
            "X" => PosTag::X,
            other => return Err(format!("unknown part-of-speech tag '{}'", other)),
        };
        Ok(tag)
    }
}

/// One term proposed by the extractor, before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateAspect {
    /// Surface form exactly as it appears in the text.
    pub term: String,
    /// Lowercased form used for comparison and stopword lookup.
    pub normalized: String,
    pub pos: PosTag,
    /// Byte range of the surface form in the source text.
    pub span: (usize, usize),
    /// Occurrences of `normalized` in the same post.
    pub repetition: usize,
}

impl CandidateAspect {
    pub fn new(term: impl Into<String>, pos: PosTag, span: (usize, usize)) -> Self {
        let term = term.into();
        let normalized = term.to_lowercase();
        Self {
            term,
            normalized,
            pos,
            span,
            repetition: 1,
        }
    }

    pub fn with_repetition(mut self, repetition: usize) -> Self {
        self.repetition = repetition;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    UrlOrMention,
    TooShort,
    Stopword,
    WrongPos,
    TooRepetitive,
}

impl RejectionReason {
    /// All reasons in rule priority order.
    pub const ALL: [RejectionReason; 5] = [
        RejectionReason::UrlOrMention,
        RejectionReason::TooShort,
        RejectionReason::Stopword,
        RejectionReason::WrongPos,
        RejectionReason::TooRepetitive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::UrlOrMention => "url_or_mention",
            RejectionReason::TooShort => "too_short",
            RejectionReason::Stopword => "stopword",
            RejectionReason::WrongPos => "wrong_pos",
            RejectionReason::TooRepetitive => "too_repetitive",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Kept,
    Rejected(RejectionReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDecision {
    pub candidate: CandidateAspect,
    pub verdict: Verdict,
}

impl FilterDecision {
    pub fn is_kept(&self) -> bool {
        matches!(self.verdict, Verdict::Kept)
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self.verdict {
            Verdict::Kept => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    Sentiment,
    Emotion,
    Tone,
    Topic,
}

impl ScorerKind {
    pub const ALL: [ScorerKind; 4] = [
        ScorerKind::Sentiment,
        ScorerKind::Emotion,
        ScorerKind::Tone,
        ScorerKind::Topic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScorerKind::Sentiment => "sentiment",
            ScorerKind::Emotion => "emotion",
            ScorerKind::Tone => "tone",
            ScorerKind::Topic => "topic",
        }
    }
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    CriticalIronic,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::CriticalIronic => "critical_ironic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Joy,
        EmotionLabel::Sadness,
        EmotionLabel::Anger,
        EmotionLabel::Fear,
        EmotionLabel::Surprise,
        EmotionLabel::Disgust,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Joy => "joy",
            EmotionLabel::Sadness => "sadness",
            EmotionLabel::Anger => "anger",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneLabel {
    Neutral,
    Questioning,
    Skeptical,
    Critical,
}

impl ToneLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToneLabel::Neutral => "neutral",
            ToneLabel::Questioning => "questioning",
            ToneLabel::Skeptical => "skeptical",
            ToneLabel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicLabel {
    TechAi,
    Politics,
    Business,
    Environment,
    Entertainment,
    Health,
    Education,
    Sports,
    Unknown,
}

impl TopicLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicLabel::TechAi => "tech_ai",
            TopicLabel::Politics => "politics",
            TopicLabel::Business => "business",
            TopicLabel::Environment => "environment",
            TopicLabel::Entertainment => "entertainment",
            TopicLabel::Health => "health",
            TopicLabel::Education => "education",
            TopicLabel::Sports => "sports",
            TopicLabel::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectScore {
    pub aspect: String,
    pub label: String,
    pub confidence: f64,
}

/// Output of one scorer for one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub kind: ScorerKind,
    pub label: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<LabelScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<AspectScore>,
}

impl ScoreResult {
    /// Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn new(kind: ScorerKind, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            label: label.into(),
            confidence: clamp_unit(confidence),
            signals: Vec::new(),
            secondary: Vec::new(),
            aspects: Vec::new(),
        }
    }

    pub fn with_signals(mut self, signals: Vec<String>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_secondary(mut self, secondary: Vec<LabelScore>) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn with_aspects(mut self, aspects: Vec<AspectScore>) -> Self {
        self.aspects = aspects;
        self
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The unit handed to the index sink. Built in one go by the assembler.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedDocument {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
    pub instance: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub hashtags: Vec<String>,
    pub favourites: u64,
    pub reblogs: u64,
    pub replies: u64,
    pub score: u64,
    pub aspects: Vec<String>,
    pub aspect_sentiments: Vec<AspectScore>,
    pub sentiment: Option<ScoreResult>,
    pub emotion: Option<ScoreResult>,
    pub emotions_flat: Vec<String>,
    pub tone: Option<ScoreResult>,
    pub topic: Option<ScoreResult>,
    pub absent_scorers: Vec<ScorerKind>,
    pub filter_mode: String,
    pub processing_ms: u64,
    pub ingested_at: DateTime<Utc>,
}

impl AnalyzedDocument {
    pub fn slot(&self, kind: ScorerKind) -> Option<&ScoreResult> {
        match kind {
            ScorerKind::Sentiment => self.sentiment.as_ref(),
            ScorerKind::Emotion => self.emotion.as_ref(),
            ScorerKind::Tone => self.tone.as_ref(),
            ScorerKind::Topic => self.topic.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> serde_json::Value {
        serde_json::json!({
            "toot_id": "113",
            "text": "I love AI in Morocco! #Morocco #AI",
            "author_id": 42,
            "author_username": "amina",
            "instance": "mastodon.social",
            "lang": "en",
            "created_at": "2025-01-15T10:30:00+01:00",
            "hashtags": ["#Morocco", "AI"],
            "favourites_count": 3,
            "reblogs_count": 2,
            "replies_count": 1,
            "score": 5,
            "url": "https://mastodon.social/@amina/113"
        })
    }

    #[test]
    fn test_parse_wire_aliases() {
        let post = RawPost::from_json(&payload().to_string()).unwrap();
        assert_eq!(post.id, "113");
        assert_eq!(post.author, "42");
        assert_eq!(post.language, "en");
        assert_eq!(post.hashtags, vec!["Morocco", "AI"]);
        assert_eq!(post.score(), 5);
        assert_eq!(post.created_at.to_rfc3339(), "2025-01-15T09:30:00+00:00");
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let mut value = payload();
        value.as_object_mut().unwrap().remove("created_at");
        let err = RawPost::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedInput { ref reason } if reason.contains("created_at")));
    }

    #[test]
    fn test_optional_fields_tolerated() {
        let mut value = payload();
        let obj = value.as_object_mut().unwrap();
        obj.remove("author_username");
        obj.insert("hashtags".to_string(), serde_json::json!([]));
        let post = RawPost::from_json(&value.to_string()).unwrap();
        assert!(post.hashtags.is_empty());
        assert_eq!(post.author_username, None);
        assert_eq!(post.title, None);
    }

    #[test]
    fn test_missing_engagement_fields_are_malformed() {
        for field in ["hashtags", "favourites_count", "reblogs_count", "replies_count", "score"] {
            let mut value = payload();
            value.as_object_mut().unwrap().remove(field);
            let err = RawPost::from_json(&value.to_string()).unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedInput { .. }),
                "{} should be required",
                field
            );
        }
    }

    #[test]
    fn test_core_fields_only_is_rejected() {
        let bare = serde_json::json!({
            "id": "1",
            "text": "hello",
            "author": "7",
            "instance": "mastodon.social",
            "language": "en",
            "created_at": "2025-01-05T10:00:00Z",
            "url": "https://mastodon.social/@x/1"
        });
        assert!(RawPost::from_json(&bare.to_string()).is_err());
    }

    #[test]
    fn test_score_mismatch_uses_derived_value() {
        let mut value = payload();
        value["score"] = serde_json::json!(99);
        let post = RawPost::from_json(&value.to_string()).unwrap();
        assert_eq!(post.score(), 5);
    }

    #[test]
    fn test_invalid_timestamp_and_json() {
        let mut value = payload();
        value["created_at"] = serde_json::json!("yesterday");
        assert!(RawPost::from_json(&value.to_string()).is_err());
        assert!(matches!(
            RawPost::from_json("{not json"),
            Err(CoreError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_score_result_clamps_confidence() {
        assert_eq!(ScoreResult::new(ScorerKind::Tone, "critical", 1.7).confidence, 1.0);
        assert_eq!(ScoreResult::new(ScorerKind::Tone, "neutral", -0.2).confidence, 0.0);
        assert_eq!(ScoreResult::new(ScorerKind::Tone, "neutral", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_pos_tag_round_trip_names() {
        assert_eq!("propn".parse::<PosTag>().unwrap(), PosTag::Propn);
        assert!("BOGUS".parse::<PosTag>().is_err());
    }
}
