//! Per-post analysis: extraction, filtering, concurrent scoring, assembly.

use crate::assembler::{assemble, Analysis};
use crate::stage::ProcessingStage;
use absa_core::{
    AnalysisError, AnalyzedDocument, AppConfig, CandidateAspect, ConfigError, CoreError,
    FilterMode, RawPost, ScoreResult, ScorerKind, StatsAggregator, StatsEvent, ToneLabel,
};
use absa_engine::filter;
use absa_engine::{default_scorers, normalize_language, AspectExtractor, LexicalAspectExtractor, Scorer};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// A post that could not be turned into a document.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: ProcessingStage,
    pub error: CoreError,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub extractor_timeout: Duration,
    pub scorer_timeout: Duration,
    pub default_language: String,
    pub max_document_text_chars: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            extractor_timeout: config.worker.extractor_timeout(),
            scorer_timeout: config.worker.scorer_timeout(),
            default_language: config.worker.default_language.clone(),
            max_document_text_chars: config.worker.max_document_text_chars,
        }
    }
}

enum Extraction {
    Candidates(Vec<CandidateAspect>),
    /// No lexicon for the language; scored without aspects.
    Unsupported,
    Failed(AnalysisError),
}

pub struct AnalysisPipeline {
    extractor: Arc<dyn AspectExtractor>,
    scorers: Vec<Arc<dyn Scorer>>,
    mode: FilterMode,
    stats: StatsAggregator,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    pub fn new(
        extractor: Arc<dyn AspectExtractor>,
        scorers: Vec<Arc<dyn Scorer>>,
        mode: FilterMode,
        stats: StatsAggregator,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            scorers,
            mode,
            stats,
            settings,
        }
    }

    /// The lexical extractor and the four lexicon scorers, set up from `config`.
    pub fn from_config(config: &AppConfig, stats: StatsAggregator) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Arc::new(LexicalAspectExtractor::new()),
            default_scorers(config)?,
            config.filter_mode()?,
            stats,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn filter_mode(&self) -> &FilterMode {
        &self.mode
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub async fn analyze(&self, post: RawPost) -> Result<AnalyzedDocument, StageFailure> {
        let started = Instant::now();

        let mut language = normalize_language(&post.language);
        if language.is_empty() {
            language = normalize_language(&self.settings.default_language);
        }
        self.stats.record(StatsEvent::LanguageSeen(language.clone()));

        let extraction = self.extract(&post.text, &language).await;
        let extraction_error = match &extraction {
            Extraction::Failed(e) => Some(e.clone()),
            _ => None,
        };
        let candidates = match extraction {
            Extraction::Candidates(candidates) => candidates,
            Extraction::Unsupported => {
                self.stats.record(StatsEvent::UnsupportedLanguage);
                Vec::new()
            }
            Extraction::Failed(e) => {
                warn!("[{}] post {}: {}", ProcessingStage::Extracting, post.id, e);
                Vec::new()
            }
        };

        let outcome = filter::apply(candidates, &self.mode);
        let mut events: Vec<StatsEvent> = outcome
            .kept_decisions
            .iter()
            .map(|_| StatsEvent::AspectFound)
            .collect();
        events.extend(
            outcome
                .rejected
                .iter()
                .filter_map(|d| d.reason())
                .map(StatsEvent::AspectRejected),
        );
        self.stats.record_all(events);
        debug!(
            "[{}] post {}: kept {:?}, rejected {}",
            ProcessingStage::Filtering,
            post.id,
            outcome.kept,
            outcome.rejected.len()
        );

        let (scores, absent) = self.score(&post.text, &outcome.kept).await;
        if let Some(error) = extraction_error {
            if scores.is_empty() {
                return Err(StageFailure {
                    stage: ProcessingStage::Scoring,
                    error: CoreError::Analysis(error),
                });
            }
        }

        let analysis = Analysis {
            aspects: outcome.kept,
            scores,
            absent,
            filter_mode: self.mode.name.clone(),
            processing_ms: started.elapsed().as_millis() as u64,
            ingested_at: Utc::now(),
        };
        let doc = assemble(post, analysis, self.settings.max_document_text_chars);

        if let Some(tone) = doc.slot(ScorerKind::Tone) {
            if tone.label == ToneLabel::Critical.as_str() {
                self.stats.record(StatsEvent::CriticalToneDetected);
            } else if tone.label == ToneLabel::Skeptical.as_str() {
                self.stats.record(StatsEvent::SkepticalToneDetected);
            }
        }
        Ok(doc)
    }

    async fn extract(&self, text: &str, language: &str) -> Extraction {
        let extractor = Arc::clone(&self.extractor);
        let text = text.to_string();
        let lang = language.to_string();
        let task = tokio::task::spawn_blocking(move || {
            extractor
                .extract(&text, &lang)
                .map(|stream| stream.collect::<Vec<_>>())
        });

        match timeout(self.settings.extractor_timeout, task).await {
            Ok(Ok(Ok(candidates))) => Extraction::Candidates(candidates),
            Ok(Ok(Err(AnalysisError::UnsupportedLanguage { .. }))) => Extraction::Unsupported,
            Ok(Ok(Err(e))) => Extraction::Failed(e),
            Ok(Err(join_error)) => Extraction::Failed(AnalysisError::ExtractorUnavailable {
                reason: join_error.to_string(),
            }),
            Err(_) => Extraction::Failed(AnalysisError::ExtractorTimeout {
                timeout_ms: self.settings.extractor_timeout.as_millis() as u64,
            }),
        }
    }

    /// Run every scorer concurrently. Failed or late scorers leave their
    /// slot empty and are listed in the second vector.
    async fn score(&self, text: &str, aspects: &[String]) -> (Vec<ScoreResult>, Vec<ScorerKind>) {
        let limit = self.settings.scorer_timeout;
        let runs = self.scorers.iter().map(|scorer| async move {
            let kind = scorer.kind();
            let result = match timeout(limit, scorer.score(text, aspects)).await {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::ScorerTimeout {
                    scorer: kind.as_str().to_string(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            };
            (kind, result)
        });

        let mut scores = Vec::new();
        let mut absent = Vec::new();
        for (kind, result) in join_all(runs).await {
            match result {
                Ok(score) => scores.push(score),
                Err(e) => {
                    warn!("[{}] {} slot left empty: {}", ProcessingStage::Scoring, kind, e);
                    self.stats.record(StatsEvent::ScorerAbsent(kind));
                    absent.push(kind);
                }
            }
        }

        // A configured-out scorer is absent too.
        for kind in ScorerKind::ALL {
            if !self.scorers.iter().any(|s| s.kind() == kind) && !absent.contains(&kind) {
                absent.push(kind);
            }
        }
        (scores, absent)
    }
}
