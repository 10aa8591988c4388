use crate::{RejectionReason, ScorerKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Everything the pipeline reports to the stats ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsEvent {
    PostProcessed,
    PostIndexed,
    PostError,
    AspectFound,
    AspectRejected(RejectionReason),
    CriticalToneDetected,
    SkepticalToneDetected,
    UnsupportedLanguage,
    ScorerAbsent(ScorerKind),
    BatchDropped,
    LanguageSeen(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub processed: u64,
    pub indexed: u64,
    pub errors: u64,
    pub aspects_found: u64,
    pub aspects_filtered: u64,
    pub rejections: BTreeMap<RejectionReason, u64>,
    pub critical_tone_count: u64,
    pub skeptical_tone_count: u64,
    pub unsupported_language: u64,
    pub scorer_absent: BTreeMap<String, u64>,
    pub batches_dropped: u64,
    pub languages: BTreeMap<String, u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

impl RunStats {
    fn apply(&mut self, event: &StatsEvent) {
        match event {
            StatsEvent::PostProcessed => self.processed += 1,
            StatsEvent::PostIndexed => self.indexed += 1,
            StatsEvent::PostError => self.errors += 1,
            StatsEvent::AspectFound => self.aspects_found += 1,
            StatsEvent::AspectRejected(reason) => {
                self.aspects_filtered += 1;
                *self.rejections.entry(*reason).or_insert(0) += 1;
            }
            StatsEvent::CriticalToneDetected => self.critical_tone_count += 1,
            StatsEvent::SkepticalToneDetected => self.skeptical_tone_count += 1,
            StatsEvent::UnsupportedLanguage => self.unsupported_language += 1,
            StatsEvent::ScorerAbsent(kind) => {
                *self.scorer_absent.entry(kind.as_str().to_string()).or_insert(0) += 1;
            }
            StatsEvent::BatchDropped => self.batches_dropped += 1,
            StatsEvent::LanguageSeen(code) => {
                *self.languages.entry(code.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn rejected(&self, reason: RejectionReason) -> u64 {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }

    /// Share of candidate aspects that survived filtering, in percent.
    pub fn keep_rate(&self) -> f64 {
        let total = self.aspects_found + self.aspects_filtered;
        if total == 0 {
            0.0
        } else {
            self.aspects_found as f64 / total as f64 * 100.0
        }
    }
}

/// Process-wide, increment-only counters. Cloning shares the same ledger.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    stats: Arc<Mutex<RunStats>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        let stats = RunStats {
            started_at: Some(Utc::now()),
            ..RunStats::default()
        };
        Self {
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    pub fn record(&self, event: StatsEvent) {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply(&event);
    }

    /// Apply several events under one lock so snapshots never see half of them.
    pub fn record_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = StatsEvent>,
    {
        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for event in events {
            stats.apply(&event);
        }
    }

    /// Final outcome of one post: processed plus exactly one of indexed/error.
    pub fn record_outcome(&self, indexed: bool) {
        let outcome = if indexed {
            StatsEvent::PostIndexed
        } else {
            StatsEvent::PostError
        };
        self.record_all([StatsEvent::PostProcessed, outcome]);
    }

    pub fn snapshot(&self) -> RunStats {
        let mut snapshot = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(started) = snapshot.started_at {
            snapshot.uptime_secs = (Utc::now() - started).num_seconds().max(0) as u64;
        }
        snapshot
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    pub fn log_snapshot(&self, filter_mode: &str) {
        let stats = self.snapshot();
        info!(
            "STATS [{}] uptime={}s processed={} indexed={} errors={} aspects kept={} filtered={} ({:.1}% kept)",
            filter_mode.to_uppercase(),
            stats.uptime_secs,
            stats.processed,
            stats.indexed,
            stats.errors,
            stats.aspects_found,
            stats.aspects_filtered,
            stats.keep_rate()
        );
        let reasons: Vec<String> = RejectionReason::ALL
            .iter()
            .map(|reason| format!("{}={}", reason, stats.rejected(*reason)))
            .collect();
        info!("Rejections: {}", reasons.join(" "));
        info!(
            "Tone: critical={} skeptical={} | unsupported_language={} batches_dropped={}",
            stats.critical_tone_count,
            stats.skeptical_tone_count,
            stats.unsupported_language,
            stats.batches_dropped
        );
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = StatsAggregator::new();
        stats.record(StatsEvent::AspectFound);
        stats.record(StatsEvent::AspectFound);
        stats.record(StatsEvent::AspectRejected(RejectionReason::Stopword));
        stats.record(StatsEvent::CriticalToneDetected);
        stats.record(StatsEvent::ScorerAbsent(ScorerKind::Tone));
        stats.record(StatsEvent::LanguageSeen("fr".to_string()));
        stats.record_outcome(true);
        stats.record_outcome(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.indexed, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.aspects_found, 2);
        assert_eq!(snapshot.aspects_filtered, 1);
        assert_eq!(snapshot.rejected(RejectionReason::Stopword), 1);
        assert_eq!(snapshot.rejected(RejectionReason::TooShort), 0);
        assert_eq!(snapshot.critical_tone_count, 1);
        assert_eq!(snapshot.scorer_absent.get("tone"), Some(&1));
        assert_eq!(snapshot.languages.get("fr"), Some(&1));
    }

    #[test]
    fn test_clones_share_ledger() {
        let stats = StatsAggregator::new();
        let handle = stats.clone();
        handle.record_outcome(true);
        assert_eq!(stats.snapshot().indexed, 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let stats = StatsAggregator::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_outcome(true);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 2000);
        assert_eq!(snapshot.processed, snapshot.indexed + snapshot.errors);
    }

    #[test]
    fn test_export_json() {
        let stats = StatsAggregator::new();
        stats.record(StatsEvent::AspectRejected(RejectionReason::UrlOrMention));
        let exported = stats.export_json().unwrap();
        assert!(exported.contains("\"processed\""));
        assert!(exported.contains("url_or_mention"));
    }
}
