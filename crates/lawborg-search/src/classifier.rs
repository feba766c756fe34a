use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Legal,
    Academic,
    Technical,
    General,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    OfficialFirst,
    AcademicFirst,
    GeneralFirst,
    Multilingual,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfficialFirst => "official-first",
            Self::AcademicFirst => "academic-first",
            Self::GeneralFirst => "general-first",
            Self::Multilingual => "multilingual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "official-first" => Some(Self::OfficialFirst),
            "academic-first" => Some(Self::AcademicFirst),
            "general-first" => Some(Self::GeneralFirst),
            "multilingual" => Some(Self::Multilingual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub normalized_query: String,
    pub category: Category,
    pub confidence: f64,
    pub strategy: Strategy,
    pub extracted_keywords: Vec<String>,
    pub extracted_entities: Vec<String>,
    pub detected_language: Language,
    pub complexity: Complexity,
}

// ── Vocabularies ─────────────────────────────────────────────────────────

const LEGAL_TERMS: &[&str] = &[
    "law", "laws", "ley", "leyes", "statute", "statutes", "regulation", "regulations",
    "reglamento", "court", "courts", "tribunal", "ruling", "sentencia", "jurisprudence",
    "jurisprudencia", "contract", "contrato", "constitution", "constitución", "article",
    "artículo", "decree", "decreto", "código", "lawsuit", "demanda", "filing", "claim",
    "liability", "responsabilidad", "plaintiff", "defendant", "attorney", "abogado", "legal",
    "judge", "juez", "precedent", "norma", "derecho", "rights", "derechos", "tax", "impuesto",
    "civil", "penal", "criminal", "lease", "arrendamiento", "tenant", "inquilino",
];

const ACADEMIC_TERMS: &[&str] = &[
    "study", "estudio", "research", "investigación", "thesis", "tesis", "paper", "journal",
    "university", "universidad", "theory", "teoría", "doctrine", "doctrina", "scholar",
    "scholarly", "peer-reviewed", "bibliography", "bibliografía", "dissertation",
];

const TECHNICAL_TERMS: &[&str] = &[
    "software", "api", "algorithm", "algoritmo", "database", "protocol", "protocolo", "server",
    "servidor", "network", "encryption", "cifrado", "configuration", "install", "instalar",
    "compile", "framework", "linux", "python", "rust",
];

const GENERAL_TERMS: &[&str] = &[
    "news", "noticias", "history", "historia", "price", "precio", "weather", "clima", "best",
    "mejor", "guide", "guía", "recipe", "receta", "travel", "viaje", "movie", "película",
];

const LEGAL_WEIGHT: f64 = 1.0;
const ACADEMIC_WEIGHT: f64 = 1.0;
const TECHNICAL_WEIGHT: f64 = 1.0;
const GENERAL_WEIGHT: f64 = 0.5;
/// Structural entities (dates, articles, statutes) count toward legal.
const ENTITY_WEIGHT: f64 = 1.5;
/// Weighted score that maps to confidence 1.0.
const CONFIDENCE_SCALE: f64 = 3.0;

const ES_STOPWORDS: &[&str] = &[
    "el", "la", "los", "las", "de", "del", "que", "en", "y", "un", "una", "por", "para", "con",
    "es", "qué", "cómo", "cuál", "sobre", "se",
];
const EN_STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "to", "in", "is", "what", "how", "which", "for", "on",
    "with", "are", "does", "about",
];

static RE_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4})\b").ok()
});
static RE_ARTICLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:art(?:ículo|iculo|icle)?\.?)\s*\d+[a-z]?\b").ok()
});
static RE_STATUTE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?:\b\d+\s*(?:u\.?s\.?c\.?|c\.?f\.?r\.?)\s*§*\s*\d+[a-z0-9.\-]*|§+\s*\d+[a-z0-9.\-]*|\b(?:ley|law|act|public law)\s+(?:no\.?\s*)?\d+(?:[-/]\d+)?)",
    )
    .ok()
});

/// Keyword/entity classifier that picks a cascade strategy for a query.
/// Pure and infallible.
pub struct QueryClassifier {
    jurisdiction: String,
    jurisdiction_markers: Vec<String>,
}

impl QueryClassifier {
    pub fn new(jurisdiction: impl Into<String>, jurisdiction_markers: Vec<String>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            jurisdiction_markers,
        }
    }

    pub fn classify(&self, query: &str) -> Classification {
        let trimmed = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let lower = trimmed.to_lowercase();
        let words = tokenize(&lower);

        let mut extracted_keywords = Vec::new();
        let mut hits = |vocab: &[&str]| -> usize {
            let mut n = 0;
            for w in &words {
                if vocab.contains(&w.as_str()) {
                    n += 1;
                    if !extracted_keywords.contains(w) {
                        extracted_keywords.push(w.clone());
                    }
                }
            }
            n
        };
        let legal_hits = hits(LEGAL_TERMS);
        let academic_hits = hits(ACADEMIC_TERMS);
        let technical_hits = hits(TECHNICAL_TERMS);
        let general_hits = hits(GENERAL_TERMS);
        let extracted_entities = entities(&lower);

        let scores = [
            (
                Category::Legal,
                legal_hits as f64 * LEGAL_WEIGHT + extracted_entities.len() as f64 * ENTITY_WEIGHT,
            ),
            (Category::Academic, academic_hits as f64 * ACADEMIC_WEIGHT),
            (Category::Technical, technical_hits as f64 * TECHNICAL_WEIGHT),
            (Category::General, general_hits as f64 * GENERAL_WEIGHT),
        ];
        // Legal comes first and only a strictly higher score displaces it.
        let (category, best) = scores
            .iter()
            .copied()
            .fold((Category::Undefined, 0.0_f64), |(cat, best), (c, s)| {
                if s > best {
                    (c, s)
                } else {
                    (cat, best)
                }
            });
        let confidence = (best / CONFIDENCE_SCALE).min(1.0);

        let base = match category {
            Category::Legal => Strategy::OfficialFirst,
            Category::Academic => Strategy::AcademicFirst,
            Category::Technical | Category::General | Category::Undefined => Strategy::GeneralFirst,
        };
        let strategy = if confidence < 0.3 {
            Strategy::Multilingual
        } else {
            base
        };

        let normalized_query = if category == Category::Legal
            && confidence > 0.5
            && !self.has_jurisdiction_marker(&lower)
            && !self.jurisdiction.is_empty()
        {
            format!("{trimmed} {}", self.jurisdiction)
        } else {
            trimmed
        };

        debug!(
            query = %normalized_query,
            category = ?category,
            confidence,
            strategy = strategy.as_str(),
            "query classified"
        );

        Classification {
            normalized_query,
            category,
            confidence,
            strategy,
            extracted_keywords,
            extracted_entities,
            detected_language: detect_language(&lower),
            complexity: complexity(words.len()),
        }
    }

    fn has_jurisdiction_marker(&self, lower: &str) -> bool {
        let own = self.jurisdiction.to_lowercase();
        (!own.is_empty() && lower.contains(&own))
            || self
                .jurisdiction_markers
                .iter()
                .any(|m| !m.is_empty() && contains_marker(lower, m))
    }
}

/// Whole-word containment for alphanumeric markers, plain substring for
/// abbreviations such as "u.s.".
fn contains_marker(lower: &str, marker: &str) -> bool {
    if marker.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        let words = tokenize(lower).join(" ");
        format!(" {words} ").contains(&format!(" {marker} "))
    } else {
        lower.contains(marker)
    }
}

pub(crate) fn tokenize(lower: &str) -> Vec<String> {
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn entities(lower: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for re in [&*RE_DATE, &*RE_ARTICLE, &*RE_STATUTE].into_iter().flatten() {
        for m in re.find_iter(lower) {
            let s = m.as_str().trim().to_string();
            if !out.contains(&s) {
                out.push(s);
            }
        }
    }
    out
}

/// `es` / `en` by stop-word count, `unknown` when neither appears or they tie.
pub fn detect_language(text: &str) -> Language {
    let words = tokenize(&text.to_lowercase());
    let es = words.iter().filter(|w| ES_STOPWORDS.contains(&w.as_str())).count();
    let en = words.iter().filter(|w| EN_STOPWORDS.contains(&w.as_str())).count();
    match es.cmp(&en) {
        std::cmp::Ordering::Greater => Language::Es,
        std::cmp::Ordering::Less => Language::En,
        std::cmp::Ordering::Equal => Language::Unknown,
    }
}

/// Query words that are not stop-words in either language.
pub fn content_words(text: &str) -> Vec<String> {
    tokenize(&text.to_lowercase())
        .into_iter()
        .filter(|w| !ES_STOPWORDS.contains(&w.as_str()) && !EN_STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn complexity(word_count: usize) -> Complexity {
    match word_count {
        0..=4 => Complexity::Simple,
        5..=12 => Complexity::Moderate,
        _ => Complexity::Complex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> QueryClassifier {
        QueryClassifier::new(
            "United States",
            vec!["united states".into(), "u.s.".into(), "usa".into(), "federal".into()],
        )
    }

    #[test]
    fn unknown_query_is_undefined_and_multilingual() {
        let c = classifier().classify("what is X");
        assert_eq!(c.category, Category::Undefined);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.strategy, Strategy::Multilingual);
        assert_eq!(c.normalized_query, "what is X");
        assert!(c.extracted_keywords.is_empty());
    }

    #[test]
    fn strong_legal_query_gets_jurisdiction_appended() {
        let c = classifier().classify("statute of limitations for contract claim");
        assert_eq!(c.category, Category::Legal);
        assert!(c.confidence > 0.5);
        assert_eq!(c.strategy, Strategy::OfficialFirst);
        assert_eq!(
            c.normalized_query,
            "statute of limitations for contract claim United States"
        );
    }

    #[test]
    fn jurisdiction_marker_suppresses_append() {
        let c = classifier().classify("federal statute on contract claim");
        assert_eq!(c.category, Category::Legal);
        assert_eq!(c.normalized_query, "federal statute on contract claim");
    }

    #[test]
    fn statute_identifiers_count_as_legal_entities() {
        let c = classifier().classify("42 U.S.C. § 1983 research");
        assert_eq!(c.category, Category::Legal);
        assert!(!c.extracted_entities.is_empty());
    }

    #[test]
    fn tie_goes_to_legal() {
        let c = classifier().classify("contract research");
        assert_eq!(c.category, Category::Legal);
    }

    #[test]
    fn academic_query_prefers_academic_tier() {
        let c = classifier().classify("doctrine thesis university journal");
        assert_eq!(c.category, Category::Academic);
        assert_eq!(c.strategy, Strategy::AcademicFirst);
    }

    #[test]
    fn weak_match_is_forced_multilingual() {
        let c = classifier().classify("weather tomorrow");
        assert_eq!(c.category, Category::General);
        assert!(c.confidence < 0.3);
        assert_eq!(c.strategy, Strategy::Multilingual);
    }

    #[test]
    fn language_and_complexity() {
        assert_eq!(detect_language("qué es la ley de arrendamiento"), Language::Es);
        assert_eq!(detect_language("what is the rule"), Language::En);
        assert_eq!(detect_language("habeas corpus"), Language::Unknown);
        assert_eq!(complexity(3), Complexity::Simple);
        assert_eq!(complexity(8), Complexity::Moderate);
        assert_eq!(complexity(20), Complexity::Complex);
    }

    #[test]
    fn strategy_round_trips_through_str() {
        for s in [
            Strategy::OfficialFirst,
            Strategy::AcademicFirst,
            Strategy::GeneralFirst,
            Strategy::Multilingual,
        ] {
            assert_eq!(Strategy::parse(s.as_str()), Some(s));
        }
    }
}
