//! Word lists backing the rule-based part-of-speech tagger.

use absa_core::PosTag;
use std::collections::{HashMap, HashSet};

/// Tagging resources for one language.
pub struct PosLexicon {
    closed: HashMap<&'static str, PosTag>,
    verbs: HashSet<&'static str>,
    adjectives: HashSet<&'static str>,
    adverbs: HashSet<&'static str>,
    /// Checked in order, longest suffixes first.
    suffixes: Vec<(&'static str, PosTag)>,
    elisions: HashMap<&'static str, PosTag>,
}

impl PosLexicon {
    pub fn english() -> Self {
        let mut closed = HashMap::new();
        insert_all(
            &mut closed,
            PosTag::Pron,
            &[
                "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
                "my", "your", "his", "its", "our", "their", "mine", "yours", "ours", "theirs",
                "myself", "yourself", "itself", "themselves", "who", "whom", "what", "which",
                "someone", "something", "anyone", "anything", "everyone", "everything", "nobody",
                "nothing",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Det,
            &[
                "the", "a", "an", "this", "that", "these", "those", "some", "any", "every",
                "each", "no", "all", "both", "either", "neither", "another", "such",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Adp,
            &[
                "in", "on", "at", "of", "for", "with", "about", "from", "to", "by", "into",
                "over", "under", "after", "before", "between", "through", "during", "without",
                "within", "against", "among", "around", "via", "per", "than",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Aux,
            &[
                "is", "are", "was", "were", "be", "been", "being", "am", "do", "does", "did",
                "have", "has", "had", "will", "would", "can", "could", "should", "may", "might",
                "must", "shall", "isn't", "aren't", "wasn't", "weren't", "don't", "doesn't",
                "didn't", "won't", "can't", "couldn't", "shouldn't", "it's", "i'm", "you're",
                "we're", "they're", "i've", "i'll",
            ],
        );
        insert_all(&mut closed, PosTag::Cconj, &["and", "or", "but", "nor", "yet", "so"]);
        insert_all(
            &mut closed,
            PosTag::Sconj,
            &[
                "if", "because", "while", "although", "though", "when", "whether", "since",
                "unless", "until", "whereas",
            ],
        );
        insert_all(&mut closed, PosTag::Part, &["not", "n't"]);
        insert_all(
            &mut closed,
            PosTag::Intj,
            &["oh", "wow", "hey", "lol", "yes", "yeah", "ouch", "omg", "ugh", "haha", "thanks"],
        );

        let verbs = set(&[
            "love", "loves", "loved", "like", "likes", "liked", "hate", "hates", "hated",
            "think", "thinks", "thought", "know", "knows", "knew", "want", "wants", "wanted",
            "need", "needs", "make", "makes", "made", "get", "gets", "got", "go", "goes", "went",
            "see", "sees", "saw", "say", "says", "said", "use", "uses", "used", "build",
            "builds", "built", "work", "works", "help", "helps", "try", "tries", "feel", "feels",
            "felt", "believe", "believes", "enjoy", "enjoys", "adore", "despise", "fear",
            "fears", "worry", "worries", "win", "wins", "won", "lose", "loses", "lost", "fail",
            "fails", "failed", "replace", "replaces", "exploit", "exploits", "read", "write",
            "watch", "share", "shares", "launch", "launched", "ban", "banned", "vote", "voted",
        ]);

        let adjectives = set(&[
            "good", "bad", "great", "new", "old", "big", "small", "important", "happy", "sad",
            "amazing", "terrible", "awful", "awesome", "excellent", "horrible", "wonderful",
            "beautiful", "ugly", "best", "worst", "better", "worse", "free", "open", "fair",
            "unfair", "precarious", "angry", "scary", "afraid", "safe", "dangerous", "cheap",
            "expensive", "fast", "slow", "smart", "stupid", "nice", "cool", "fun", "boring",
            "sure", "true", "false", "real", "fake", "local", "global", "public", "private",
        ]);

        let adverbs = set(&[
            "very", "really", "just", "also", "never", "always", "often", "now", "here",
            "there", "too", "quite", "already", "still", "again", "soon", "today", "tomorrow",
            "yesterday", "maybe", "perhaps", "almost", "only", "even", "ever", "rather", "so",
            "much", "well",
        ]);

        let suffixes = vec![
            ("ness", PosTag::Noun),
            ("ment", PosTag::Noun),
            ("tion", PosTag::Noun),
            ("sion", PosTag::Noun),
            ("ship", PosTag::Noun),
            ("ity", PosTag::Noun),
            ("ism", PosTag::Noun),
            ("ist", PosTag::Noun),
            ("ous", PosTag::Adj),
            ("ful", PosTag::Adj),
            ("ive", PosTag::Adj),
            ("able", PosTag::Adj),
            ("ible", PosTag::Adj),
            ("less", PosTag::Adj),
            ("ical", PosTag::Adj),
            ("ic", PosTag::Adj),
            ("ly", PosTag::Adv),
            ("ize", PosTag::Verb),
            ("ise", PosTag::Verb),
            ("ing", PosTag::Verb),
            ("ed", PosTag::Verb),
        ];

        Self {
            closed,
            verbs,
            adjectives,
            adverbs,
            suffixes,
            elisions: HashMap::new(),
        }
    }

    pub fn french() -> Self {
        let mut closed = HashMap::new();
        insert_all(
            &mut closed,
            PosTag::Pron,
            &[
                "je", "tu", "il", "elle", "on", "nous", "vous", "ils", "elles", "me", "te", "se",
                "lui", "leur", "moi", "toi", "soi", "eux", "ça", "cela", "ceci", "qui", "quoi",
                "rien", "personne", "tout", "y",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Det,
            &[
                "le", "la", "les", "un", "une", "des", "du", "ce", "cet", "cette", "ces", "mon",
                "ma", "mes", "ton", "ta", "tes", "son", "sa", "ses", "notre", "votre", "nos",
                "vos", "leurs", "au", "aux", "quelques", "chaque", "aucun", "aucune",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Adp,
            &[
                "de", "à", "en", "dans", "sur", "sous", "pour", "par", "avec", "sans", "chez",
                "vers", "entre", "contre", "depuis", "pendant", "avant", "après", "selon",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Aux,
            &[
                "être", "avoir", "est", "sont", "suis", "es", "sommes", "êtes", "était", "étaient",
                "été", "sera", "seront", "serait", "ai", "as", "a", "avons", "avez", "ont", "avait",
                "avaient", "aura", "aurait", "eu",
            ],
        );
        insert_all(
            &mut closed,
            PosTag::Cconj,
            &["et", "ou", "mais", "donc", "or", "ni", "car"],
        );
        insert_all(
            &mut closed,
            PosTag::Sconj,
            &["que", "si", "quand", "comme", "parce", "lorsque", "puisque", "quoique"],
        );
        insert_all(&mut closed, PosTag::Part, &["ne", "pas"]);
        insert_all(
            &mut closed,
            PosTag::Intj,
            &["oh", "ah", "bah", "bof", "oui", "non", "merci", "mdr", "ouf", "hélas"],
        );

        let verbs = set(&[
            "aimer", "aime", "aimes", "aimons", "aiment", "adorer", "adore", "adorent",
            "détester", "déteste", "détestent", "penser", "pense", "pensent", "faire", "fait",
            "font", "dire", "dit", "disent", "aller", "va", "vont", "pouvoir", "peut", "peuvent",
            "vouloir", "veut", "veux", "savoir", "sait", "voir", "vois", "voit", "croire",
            "crois", "croit", "travailler", "travaille", "utiliser", "utilise", "remplacer",
            "remplace", "exploiter", "exploite", "gagner", "gagne", "perdre", "perd", "voter",
            "vote", "partager", "partage", "lire", "lis", "lit", "écrire", "écrit",
        ]);

        let adjectives = set(&[
            "bon", "bonne", "mauvais", "mauvaise", "grand", "grande", "petit", "petite",
            "nouveau", "nouvelle", "beau", "belle", "important", "importante", "génial",
            "géniale", "super", "horrible", "triste", "heureux", "heureuse", "précaire",
            "injuste", "juste", "libre", "gratuit", "gratuite", "cher", "chère", "rapide",
            "lent", "lente", "vrai", "vraie", "faux", "fausse", "public", "publique", "privé",
            "privée", "dangereux", "dangereuse", "inquiétant", "inquiétante", "exploité",
            "exploitée", "nul", "nulle",
        ]);

        let adverbs = set(&[
            "très", "vraiment", "aussi", "jamais", "toujours", "souvent", "maintenant", "ici",
            "là", "trop", "assez", "déjà", "encore", "bientôt", "aujourd'hui", "demain", "hier",
            "peut-être", "presque", "seulement", "même", "bien", "mal", "plus", "moins", "beaucoup",
        ]);

        let suffixes = vec![
            ("issement", PosTag::Noun),
            ("ement", PosTag::Adv),
            ("ment", PosTag::Adv),
            ("tion", PosTag::Noun),
            ("sion", PosTag::Noun),
            ("isme", PosTag::Noun),
            ("iste", PosTag::Noun),
            ("eur", PosTag::Noun),
            ("age", PosTag::Noun),
            ("ité", PosTag::Noun),
            ("té", PosTag::Noun),
            ("euse", PosTag::Adj),
            ("eux", PosTag::Adj),
            ("ique", PosTag::Adj),
            ("able", PosTag::Adj),
            ("ible", PosTag::Adj),
            ("if", PosTag::Adj),
            ("ive", PosTag::Adj),
            ("ait", PosTag::Verb),
            ("aient", PosTag::Verb),
            ("er", PosTag::Verb),
            ("ir", PosTag::Verb),
        ];

        let mut elisions = HashMap::new();
        insert_all(&mut elisions, PosTag::Det, &["l"]);
        insert_all(&mut elisions, PosTag::Adp, &["d", "jusqu"]);
        insert_all(&mut elisions, PosTag::Pron, &["j", "m", "t", "s", "c"]);
        insert_all(&mut elisions, PosTag::Part, &["n"]);
        insert_all(&mut elisions, PosTag::Sconj, &["qu", "lorsqu", "puisqu"]);

        Self {
            closed,
            verbs,
            adjectives,
            adverbs,
            suffixes,
            elisions,
        }
    }

    /// Tag for an elided prefix such as the `l` of `l'IA`, if it is one.
    pub fn elision(&self, prefix_lower: &str) -> Option<PosTag> {
        self.elisions.get(prefix_lower).copied()
    }

    /// Tag a single word token.
    ///
    /// `sentence_initial` suppresses the capitalization rule for words the
    /// open-class lists already know.
    pub fn tag(&self, word: &str, sentence_initial: bool) -> PosTag {
        let lower = word.to_lowercase();

        if word.chars().all(|c| c.is_numeric()) {
            return PosTag::Num;
        }
        if let Some(tag) = self.closed.get(lower.as_str()) {
            return *tag;
        }

        let open = self.open_class(&lower);
        if is_capitalized(word) && (!sentence_initial || open.is_none()) {
            return PosTag::Propn;
        }
        if let Some(tag) = open {
            return tag;
        }

        let chars = lower.chars().count();
        for (suffix, tag) in &self.suffixes {
            // Leave room for a stem so "red" or "king" are not read as suffixes.
            if chars > suffix.chars().count() + 2 && lower.ends_with(suffix) {
                return *tag;
            }
        }

        PosTag::Noun
    }

    fn open_class(&self, lower: &str) -> Option<PosTag> {
        if self.verbs.contains(lower) {
            Some(PosTag::Verb)
        } else if self.adjectives.contains(lower) {
            Some(PosTag::Adj)
        } else if self.adverbs.contains(lower) {
            Some(PosTag::Adv)
        } else {
            None
        }
    }
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().map(char::is_uppercase).unwrap_or(false)
}

fn insert_all(
    map: &mut HashMap<&'static str, PosTag>,
    tag: PosTag,
    words: &[&'static str],
) {
    for word in words {
        map.entry(*word).or_insert(tag);
    }
}

fn set(words: &[&'static str]) -> HashSet<&'static str> {
    words.iter().copied().collect()
}
