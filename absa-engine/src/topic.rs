use crate::scorer::{truncate_tokens, words, Scorer, DEFAULT_MAX_TOKENS};
use absa_core::{AnalysisError, LabelScore, ScoreResult, ScorerKind, TopicLabel};
use async_trait::async_trait;
use std::collections::HashMap;

const TOPIC_KEYWORDS: &[(TopicLabel, &[&str])] = &[
    (
        TopicLabel::TechAi,
        &[
            "ai", "ia", "llm", "chatgpt", "gpt", "openai", "algorithm", "algorithme", "software",
            "logiciel", "tech", "technology", "technologie", "robot", "robots", "data", "données",
            "machine", "neural", "model", "computer", "ordinateur", "code", "coding", "rust",
            "python", "linux", "opensource", "fediverse", "mastodon", "internet", "app",
            "surveillance",
        ],
    ),
    (
        TopicLabel::Politics,
        &[
            "election", "élection", "vote", "voted", "government", "gouvernement", "president",
            "président", "minister", "ministre", "parliament", "parlement", "policy", "politique",
            "politics", "law", "loi", "senate", "sénat", "democracy", "démocratie", "party",
            "parti", "campaign", "campagne", "protest", "manif", "grève",
        ],
    ),
    (
        TopicLabel::Business,
        &[
            "business", "market", "marché", "economy", "économie", "startup", "company",
            "entreprise", "stock", "stocks", "bourse", "investor", "investisseur", "profit",
            "revenue", "sales", "ventes", "inflation", "bank", "banque", "price", "prix", "jobs",
            "emploi", "salary", "salaire", "gig",
        ],
    ),
    (
        TopicLabel::Environment,
        &[
            "climate", "climat", "environment", "environnement", "carbon", "carbone", "emissions",
            "émissions", "pollution", "renewable", "renouvelable", "solar", "solaire", "wind",
            "biodiversity", "biodiversité", "ecology", "écologie", "warming", "réchauffement",
            "drought", "sécheresse", "flood", "inondation",
        ],
    ),
    (
        TopicLabel::Entertainment,
        &[
            "movie", "film", "films", "music", "musique", "song", "chanson", "album", "concert",
            "series", "série", "netflix", "game", "gaming", "jeu", "actor", "acteur", "actress",
            "actrice", "festival", "cinema", "cinéma", "book", "livre",
        ],
    ),
    (
        TopicLabel::Health,
        &[
            "health", "santé", "covid", "vaccine", "vaccin", "hospital", "hôpital", "doctor",
            "médecin", "disease", "maladie", "virus", "mental", "therapy", "thérapie", "cancer",
            "medicine", "médicament", "patients", "nurse", "infirmière",
        ],
    ),
    (
        TopicLabel::Education,
        &[
            "school", "école", "university", "université", "student", "students", "étudiant",
            "étudiants", "teacher", "enseignant", "professeur", "education", "éducation",
            "learning", "apprentissage", "exam", "examen", "course", "cours", "classroom",
        ],
    ),
    (
        TopicLabel::Sports,
        &[
            "football", "soccer", "match", "goal", "team", "équipe", "league", "ligue",
            "olympics", "olympiques", "tennis", "basketball", "rugby", "cup", "coupe", "player",
            "joueur", "championship", "championnat", "marathon",
        ],
    ),
];

pub struct TopicScorer {
    keywords: HashMap<&'static str, TopicLabel>,
    max_tokens: usize,
}

impl TopicScorer {
    pub fn new(max_tokens: usize) -> Self {
        let mut keywords = HashMap::new();
        for (label, words) in TOPIC_KEYWORDS {
            for word in *words {
                keywords.entry(*word).or_insert(*label);
            }
        }
        Self {
            keywords,
            max_tokens,
        }
    }
}

impl Default for TopicScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

#[async_trait]
impl Scorer for TopicScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Topic
    }

    async fn score(&self, text: &str, _aspects: &[String]) -> Result<ScoreResult, AnalysisError> {
        let mut hits: HashMap<TopicLabel, usize> = HashMap::new();
        for token in words(truncate_tokens(text, self.max_tokens)) {
            if let Some(label) = self.keywords.get(token.as_str()) {
                *hits.entry(*label).or_insert(0) += 1;
            }
        }

        let total: usize = hits.values().sum();
        if total == 0 {
            return Ok(ScoreResult::new(
                ScorerKind::Topic,
                TopicLabel::Unknown.as_str(),
                0.0,
            ));
        }

        let mut ranked: Vec<(TopicLabel, usize)> = TOPIC_KEYWORDS
            .iter()
            .filter_map(|(label, _)| hits.get(label).map(|n| (*label, *n)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let share = |n: usize| n as f64 / total as f64;
        let (top, top_hits) = ranked[0];
        let secondary = ranked[1..]
            .iter()
            .map(|(label, n)| LabelScore {
                label: label.as_str().to_string(),
                score: share(*n),
            })
            .collect();

        Ok(ScoreResult::new(ScorerKind::Topic, top.as_str(), share(top_hits))
            .with_secondary(secondary))
    }
}
