//! Filter modes are plain data: one generic decision function consumes
//! whichever mode is active. New modes can be declared in the config file.

use crate::{ConfigError, PosTag};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const STRICT: &str = "strict";
pub const BALANCED: &str = "balanced";
pub const PERMISSIVE: &str = "permissive";

/// Minimal stopword list shared by every built-in mode.
pub const MINIMAL_STOPWORDS: &[&str] = &["être", "avoir", "faire", "the", "a", "an", "and", "or"];

/// Added on top of the minimal list for the extended set.
pub const EXTENDED_STOPWORDS: &[&str] = &[
    "dire", "aller", "pouvoir", "but", "in", "on", "at", "été", "de", "du", "des", "le", "la",
    "les", "un", "une", "et", "ou", "est", "sont", "pas", "plus", "tout", "fait", "is", "are",
    "was", "be", "to", "of", "for", "with", "this", "that", "it", "its", "get", "got", "make",
    "thing", "things", "chose", "just", "very", "really", "vraiment", "très",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMode {
    pub name: String,
    pub min_length: usize,
    pub allowed_pos: BTreeSet<PosTag>,
    pub stopwords: BTreeSet<String>,
    pub max_repetition: usize,
}

impl FilterMode {
    pub fn strict() -> Self {
        Self {
            name: STRICT.to_string(),
            min_length: 3,
            allowed_pos: [PosTag::Noun, PosTag::Propn, PosTag::Adj].into_iter().collect(),
            stopwords: StopwordBase::Extended.words(),
            max_repetition: 6,
        }
    }

    pub fn balanced() -> Self {
        Self {
            name: BALANCED.to_string(),
            min_length: 2,
            allowed_pos: [PosTag::Noun, PosTag::Propn, PosTag::Adj, PosTag::Verb]
                .into_iter()
                .collect(),
            stopwords: StopwordBase::Minimal.words(),
            max_repetition: 10,
        }
    }

    pub fn permissive() -> Self {
        Self {
            name: PERMISSIVE.to_string(),
            min_length: 2,
            allowed_pos: [
                PosTag::Noun,
                PosTag::Propn,
                PosTag::Adj,
                PosTag::Verb,
                PosTag::Adv,
            ]
            .into_iter()
            .collect(),
            stopwords: StopwordBase::Minimal.words(),
            max_repetition: 15,
        }
    }

    pub fn is_stopword(&self, normalized: &str) -> bool {
        self.stopwords.contains(normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwordBase {
    #[default]
    Minimal,
    Extended,
}

impl StopwordBase {
    pub fn words(&self) -> BTreeSet<String> {
        let mut words: BTreeSet<String> =
            MINIMAL_STOPWORDS.iter().map(|w| w.to_string()).collect();
        if *self == StopwordBase::Extended {
            words.extend(EXTENDED_STOPWORDS.iter().map(|w| w.to_string()));
        }
        words
    }
}

/// A mode declared in the `[filter.modes.<name>]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterModeDefinition {
    pub min_length: usize,
    pub allowed_pos: Vec<String>,
    #[serde(default)]
    pub stopwords: StopwordBase,
    #[serde(default)]
    pub extra_stopwords: Vec<String>,
    pub max_repetition: usize,
}

impl FilterModeDefinition {
    pub fn build(&self, name: &str) -> Result<FilterMode, ConfigError> {
        let allowed_pos = self
            .allowed_pos
            .iter()
            .map(|tag| {
                tag.parse::<PosTag>().map_err(|_| ConfigError::InvalidValue {
                    field: format!("filter.modes.{}.allowed_pos", name),
                    value: tag.clone(),
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        if allowed_pos.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: format!("filter mode '{}' allows no part-of-speech tag", name),
            });
        }

        let mut stopwords = self.stopwords.words();
        stopwords.extend(self.extra_stopwords.iter().map(|w| w.to_lowercase()));

        Ok(FilterMode {
            name: name.to_lowercase(),
            min_length: self.min_length,
            allowed_pos,
            stopwords,
            max_repetition: self.max_repetition,
        })
    }
}

/// Named modes available to this process.
#[derive(Debug, Clone)]
pub struct FilterModeTable {
    modes: BTreeMap<String, FilterMode>,
}

impl FilterModeTable {
    pub fn builtin() -> Self {
        let modes = [
            FilterMode::strict(),
            FilterMode::balanced(),
            FilterMode::permissive(),
        ]
        .into_iter()
        .map(|mode| (mode.name.clone(), mode))
        .collect();
        Self { modes }
    }

    /// Built-in modes plus the configured ones. A configured mode may shadow
    /// a built-in name.
    pub fn with_definitions(
        definitions: &BTreeMap<String, FilterModeDefinition>,
    ) -> Result<Self, ConfigError> {
        let mut table = Self::builtin();
        for (name, definition) in definitions {
            let mode = definition.build(name)?;
            table.modes.insert(mode.name.clone(), mode);
        }
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Result<FilterMode, ConfigError> {
        self.modes
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFilterMode {
                mode: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }
}
