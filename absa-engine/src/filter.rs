//! Candidate filtering under the active [`FilterMode`].

use absa_core::{CandidateAspect, FilterDecision, FilterMode, RejectionReason, Verdict};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static URL_OR_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://\S+|www\.\S+|t\.co/\S+|@\w+)").unwrap()
});

/// Decide one candidate. Rules run in a fixed order and the first match is
/// the only reason reported.
pub fn decide(candidate: &CandidateAspect, mode: &FilterMode) -> FilterDecision {
    let verdict = match rejection(candidate, mode) {
        Some(reason) => Verdict::Rejected(reason),
        None => Verdict::Kept,
    };
    FilterDecision {
        candidate: candidate.clone(),
        verdict,
    }
}

fn rejection(candidate: &CandidateAspect, mode: &FilterMode) -> Option<RejectionReason> {
    if URL_OR_MENTION.is_match(candidate.term.trim()) {
        return Some(RejectionReason::UrlOrMention);
    }
    if candidate.normalized.chars().count() < mode.min_length {
        return Some(RejectionReason::TooShort);
    }
    if mode.is_stopword(&candidate.normalized) {
        return Some(RejectionReason::Stopword);
    }
    if !mode.allowed_pos.contains(&candidate.pos) {
        return Some(RejectionReason::WrongPos);
    }
    if candidate.repetition > mode.max_repetition {
        return Some(RejectionReason::TooRepetitive);
    }
    None
}

/// Result of filtering every candidate of one post.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Normalized terms, unique, in first-seen order.
    pub kept: Vec<String>,
    pub kept_decisions: Vec<FilterDecision>,
    pub rejected: Vec<FilterDecision>,
}

impl FilterOutcome {
    pub fn total(&self) -> usize {
        self.kept_decisions.len() + self.rejected.len()
    }
}

pub fn apply<I>(candidates: I, mode: &FilterMode) -> FilterOutcome
where
    I: IntoIterator<Item = CandidateAspect>,
{
    let mut outcome = FilterOutcome::default();
    let mut seen = HashSet::new();

    for candidate in candidates {
        let decision = decide(&candidate, mode);
        if decision.is_kept() {
            if seen.insert(candidate.normalized.clone()) {
                outcome.kept.push(candidate.normalized);
            }
            outcome.kept_decisions.push(decision);
        } else {
            outcome.rejected.push(decision);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use absa_core::PosTag;

    fn candidate(term: &str, pos: PosTag) -> CandidateAspect {
        CandidateAspect::new(term, pos, (0, term.len()))
    }

    #[test]
    fn test_rule_order_url_before_length() {
        let mode = FilterMode::strict();
        let decision = decide(&candidate("@a", PosTag::X), &mode);
        assert_eq!(decision.reason(), Some(RejectionReason::UrlOrMention));
        let decision = decide(&candidate("https://x.y", PosTag::X), &mode);
        assert_eq!(decision.reason(), Some(RejectionReason::UrlOrMention));
    }

    #[test]
    fn test_ete_is_stopword_under_strict() {
        let decision = decide(&candidate("été", PosTag::Aux), &FilterMode::strict());
        assert_eq!(decision.reason(), Some(RejectionReason::Stopword));
    }

    #[test]
    fn test_short_stopword_reports_too_short() {
        // "a" is in every stopword list and shorter than any min_length.
        let decision = decide(&candidate("a", PosTag::Det), &FilterMode::balanced());
        assert_eq!(decision.reason(), Some(RejectionReason::TooShort));

        let decision = decide(&candidate("de", PosTag::Adp), &FilterMode::strict());
        assert_eq!(decision.reason(), Some(RejectionReason::TooShort));
    }

    #[test]
    fn test_stopword_before_pos() {
        let decision = decide(&candidate("the", PosTag::Det), &FilterMode::balanced());
        assert_eq!(decision.reason(), Some(RejectionReason::Stopword));
    }

    #[test]
    fn test_pos_and_repetition() {
        let mode = FilterMode::balanced();
        let adverb = decide(&candidate("quickly", PosTag::Adv), &mode);
        assert_eq!(adverb.reason(), Some(RejectionReason::WrongPos));
        assert!(decide(&candidate("quickly", PosTag::Adv), &FilterMode::permissive()).is_kept());

        let spam = candidate("crypto", PosTag::Noun).with_repetition(11);
        assert_eq!(
            decide(&spam, &mode).reason(),
            Some(RejectionReason::TooRepetitive)
        );
        let ten = candidate("crypto", PosTag::Noun).with_repetition(10);
        assert!(decide(&ten, &mode).is_kept());
    }

    #[test]
    fn test_apply_dedupes_and_partitions() {
        let candidates = vec![
            candidate("Morocco", PosTag::Propn),
            candidate("in", PosTag::Adp),
            candidate("morocco", PosTag::Propn),
            candidate("love", PosTag::Verb),
        ];
        let outcome = apply(candidates.clone(), &FilterMode::balanced());
        assert_eq!(outcome.kept, vec!["morocco", "love"]);
        assert_eq!(outcome.kept_decisions.len(), 3);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.total(), candidates.len());
    }

    #[test]
    fn test_decide_is_pure() {
        let c = candidate("surveillance", PosTag::Noun).with_repetition(3);
        let mode = FilterMode::strict();
        let first = decide(&c, &mode);
        for _ in 0..10 {
            assert_eq!(decide(&c, &mode), first);
        }
    }
}
