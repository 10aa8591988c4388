//! Aspect candidate extraction.
//!
//! Text is split on whitespace first so that URLs, mentions and hashtags can
//! be recognised as whole chunks; everything else is cut into word and
//! punctuation tokens and tagged with the language's [`PosLexicon`].

use crate::lexicon::PosLexicon;
use absa_core::{AnalysisError, CandidateAspect, PosTag};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::trace;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?://|www\.|t\.co/)\S*").unwrap());
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@\w+(?:@[\w.-]*\w)?").unwrap());
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#(\w+)").unwrap());
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’-][\p{L}\p{N}]+)*|[^\s\p{L}\p{N}]").unwrap()
});

/// Opening punctuation peeled off a chunk before URL and mention matching.
const OPENING: &[char] = &['(', '[', '{', '<', '"', '\'', '«', '“', '‘'];
/// Closing punctuation never counted as part of a URL.
const URL_TRAILING: &[char] = &[
    '.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\'', '»', '”', '’',
];

pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "fr"];

/// Candidates for one post. Finite, consumed once.
#[derive(Debug)]
pub struct CandidateStream {
    inner: std::vec::IntoIter<CandidateAspect>,
}

impl CandidateStream {
    pub fn empty() -> Self {
        Self {
            inner: Vec::new().into_iter(),
        }
    }

    fn from_vec(candidates: Vec<CandidateAspect>) -> Self {
        Self {
            inner: candidates.into_iter(),
        }
    }
}

impl Iterator for CandidateStream {
    type Item = CandidateAspect;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for CandidateStream {}

pub trait AspectExtractor: Send + Sync {
    /// Candidates for `text`. `UnsupportedLanguage` when no lexicon exists
    /// for `language`; empty text always yields an empty stream.
    fn extract(&self, text: &str, language: &str) -> Result<CandidateStream, AnalysisError>;
}

/// `en-US`, `EN`, `fr_CA` and friends reduced to a bare lowercase code.
pub fn normalize_language(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

pub struct LexicalAspectExtractor {
    lexicons: HashMap<&'static str, PosLexicon>,
}

impl LexicalAspectExtractor {
    pub fn new() -> Self {
        let mut lexicons = HashMap::new();
        lexicons.insert("en", PosLexicon::english());
        lexicons.insert("fr", PosLexicon::french());

        Self { lexicons }
    }

    pub fn supports(&self, language: &str) -> bool {
        self.lexicons.contains_key(normalize_language(language).as_str())
    }

    fn tokenize(&self, text: &str, lexicon: &PosLexicon) -> Vec<CandidateAspect> {
        let mut out = Vec::new();
        let mut sentence_initial = true;

        for whole in text.split_whitespace() {
            let mut base = whole.as_ptr() as usize - text.as_ptr() as usize;
            let mut chunk = whole;

            // "(https://…)", "<@bob>": the wrapper is punctuation, the rest is matched whole.
            while let Some(c) = chunk.chars().next().filter(|c| OPENING.contains(c)) {
                let len = c.len_utf8();
                out.push(CandidateAspect::new(&chunk[..len], PosTag::Punct, (base, base + len)));
                base += len;
                chunk = &chunk[len..];
            }
            if chunk.is_empty() {
                continue;
            }

            if let Some(m) = URL.find(chunk) {
                let url = m.as_str().trim_end_matches(URL_TRAILING);
                out.push(CandidateAspect::new(url, PosTag::X, (base, base + url.len())));
                self.push_words(
                    &chunk[url.len()..],
                    base + url.len(),
                    lexicon,
                    &mut sentence_initial,
                    &mut out,
                );
                continue;
            }
            if let Some(m) = MENTION.find(chunk) {
                out.push(CandidateAspect::new(
                    m.as_str(),
                    PosTag::X,
                    (base, base + m.end()),
                ));
                self.push_words(
                    &chunk[m.end()..],
                    base + m.end(),
                    lexicon,
                    &mut sentence_initial,
                    &mut out,
                );
                continue;
            }
            if let Some(caps) = HASHTAG.captures(chunk) {
                if let Some(body) = caps.get(1) {
                    out.push(CandidateAspect::new(
                        body.as_str(),
                        PosTag::Propn,
                        (base + body.start(), base + body.end()),
                    ));
                    // Anything glued after the tag ("#AI!") is tokenized normally.
                    self.push_words(
                        &chunk[body.end()..],
                        base + body.end(),
                        lexicon,
                        &mut sentence_initial,
                        &mut out,
                    );
                    continue;
                }
            }

            self.push_words(chunk, base, lexicon, &mut sentence_initial, &mut out);
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for candidate in &out {
            *counts.entry(candidate.normalized.clone()).or_insert(0) += 1;
        }
        for candidate in &mut out {
            candidate.repetition = counts.get(&candidate.normalized).copied().unwrap_or(1);
        }

        out
    }

    fn push_words(
        &self,
        chunk: &str,
        base: usize,
        lexicon: &PosLexicon,
        sentence_initial: &mut bool,
        out: &mut Vec<CandidateAspect>,
    ) {
        for m in TOKEN.find_iter(chunk) {
            let word = m.as_str();
            let start = base + m.start();

            let first = word.chars().next().unwrap_or(' ');
            if !first.is_alphanumeric() {
                let tag = if is_punctuation(first) {
                    PosTag::Punct
                } else {
                    PosTag::Sym
                };
                out.push(CandidateAspect::new(word, tag, (start, start + word.len())));
                if matches!(first, '.' | '!' | '?' | '…') {
                    *sentence_initial = true;
                }
                continue;
            }

            if let Some((prefix, rest)) = split_elision(word) {
                if let Some(tag) = lexicon.elision(&prefix.to_lowercase()) {
                    let cut = prefix.len() + apostrophe_len(word, prefix.len());
                    out.push(CandidateAspect::new(
                        &word[..cut],
                        tag,
                        (start, start + cut),
                    ));
                    let rest_tag = lexicon.tag(rest, false);
                    out.push(CandidateAspect::new(
                        rest,
                        rest_tag,
                        (start + cut, start + word.len()),
                    ));
                    *sentence_initial = false;
                    continue;
                }
            }

            let tag = lexicon.tag(word, *sentence_initial);
            out.push(CandidateAspect::new(word, tag, (start, start + word.len())));
            *sentence_initial = false;
        }
    }
}

impl Default for LexicalAspectExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AspectExtractor for LexicalAspectExtractor {
    fn extract(&self, text: &str, language: &str) -> Result<CandidateStream, AnalysisError> {
        if text.trim().is_empty() {
            return Ok(CandidateStream::empty());
        }

        let code = normalize_language(language);
        let lexicon = self
            .lexicons
            .get(code.as_str())
            .ok_or_else(|| AnalysisError::UnsupportedLanguage {
                language: language.to_string(),
            })?;

        let candidates = self.tokenize(text, lexicon);
        trace!("Extracted {} candidates ({})", candidates.len(), code);
        Ok(CandidateStream::from_vec(candidates))
    }
}

fn split_elision(word: &str) -> Option<(&str, &str)> {
    let idx = word.find(['\'', '’'])?;
    let rest = &word[idx + apostrophe_len(word, idx)..];
    if rest.is_empty() {
        None
    } else {
        Some((&word[..idx], rest))
    }
}

fn apostrophe_len(word: &str, idx: usize) -> usize {
    word[idx..].chars().next().map(char::len_utf8).unwrap_or(0)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || "«»…–—‘’“”¿¡·".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str, lang: &str) -> Vec<CandidateAspect> {
        LexicalAspectExtractor::new()
            .extract(text, lang)
            .unwrap()
            .collect()
    }

    #[test]
    fn test_scenario_tokens() {
        let candidates = extract("I love AI in Morocco! #Morocco #AI", "en");
        let terms: Vec<(&str, PosTag)> = candidates
            .iter()
            .map(|c| (c.term.as_str(), c.pos))
            .collect();
        assert_eq!(
            terms,
            vec![
                ("I", PosTag::Pron),
                ("love", PosTag::Verb),
                ("AI", PosTag::Propn),
                ("in", PosTag::Adp),
                ("Morocco", PosTag::Propn),
                ("!", PosTag::Punct),
                ("Morocco", PosTag::Propn),
                ("AI", PosTag::Propn),
            ]
        );
        let morocco = candidates.iter().find(|c| c.normalized == "morocco").unwrap();
        assert_eq!(morocco.repetition, 2);
    }

    #[test]
    fn test_spans_point_into_text() {
        let text = "Read https://example.org/a, then ping @alice@mastodon.social #Rust";
        for candidate in extract(text, "en") {
            assert_eq!(&text[candidate.span.0..candidate.span.1], candidate.term);
        }
    }

    #[test]
    fn test_urls_and_mentions_are_whole() {
        let candidates = extract("see www.example.com and t.co/xyz via @bob", "en-US");
        let x: Vec<&str> = candidates
            .iter()
            .filter(|c| c.pos == PosTag::X)
            .map(|c| c.term.as_str())
            .collect();
        assert_eq!(x, vec!["www.example.com", "t.co/xyz", "@bob"]);

        let text = r#"Read this (https://example.org/climate-report) now "https://a.b/c" <@bob>"#;
        let candidates = extract(text, "en");
        let terms: Vec<(&str, PosTag)> = candidates
            .iter()
            .map(|c| (c.term.as_str(), c.pos))
            .collect();
        assert!(terms.contains(&("https://example.org/climate-report", PosTag::X)));
        assert!(terms.contains(&("https://a.b/c", PosTag::X)));
        assert!(terms.contains(&("@bob", PosTag::X)));
        assert!(terms.contains(&("(", PosTag::Punct)));
        assert!(terms.contains(&(")", PosTag::Punct)));
        assert!(!terms.iter().any(|(t, _)| *t == "example" || *t == "https"));
        for candidate in &candidates {
            assert_eq!(&text[candidate.span.0..candidate.span.1], candidate.term);
        }
    }

    #[test]
    fn test_french_elision() {
        let candidates = extract("l'IA remplace l’exploitation", "fr");
        let terms: Vec<&str> = candidates.iter().map(|c| c.term.as_str()).collect();
        assert_eq!(terms, vec!["l'", "IA", "remplace", "l’", "exploitation"]);
        assert_eq!(candidates[0].pos, PosTag::Det);
        assert_eq!(candidates[1].pos, PosTag::Propn);
        assert_eq!(candidates[2].pos, PosTag::Verb);
        assert_eq!(candidates[4].pos, PosTag::Noun);
    }

    #[test]
    fn test_empty_text_is_not_an_error() {
        let extractor = LexicalAspectExtractor::new();
        assert_eq!(extractor.extract("", "ja").unwrap().count(), 0);
        assert_eq!(extractor.extract("   ", "en").unwrap().count(), 0);
    }

    #[test]
    fn test_unsupported_language() {
        let extractor = LexicalAspectExtractor::new();
        let err = extractor.extract("こんにちは", "ja").unwrap_err();
        assert_eq!(
            err,
            AnalysisError::UnsupportedLanguage {
                language: "ja".to_string()
            }
        );
        assert!(extractor.supports("FR-ca"));
        assert!(!extractor.supports("de"));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language(" FR_ca "), "fr");
        assert_eq!(normalize_language(""), "");
    }
}
