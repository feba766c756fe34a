//! Cascading multi-tier search.
//!
//! A strategy expands into an ordered list of `(query variant, tier)`
//! attempts. The cascade walks that list with an explicit state machine:
//!
//! ```text
//! Attempt(i) --results survive--> Success
//!            --error/empty------> Continue(i) --> Attempt(i + 1)
//! Attempt(past end) ------------> Exhausted
//! ```
//!
//! Provider problems are logged and absorbed; the caller only ever sees a
//! [`CascadeOutcome`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{content_words, detect_language, Language, Strategy};
use crate::providers::knowledge_base;
use crate::providers::reader::{clip, PageExtractor};
use crate::providers::{ScopedSearch, SearchOutcome, SearchProvider, SearchResult};
use crate::scoring::ScoringPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTier {
    Official,
    Academic,
    General,
    KnowledgeBase,
}

impl SearchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Academic => "academic",
            Self::General => "general",
            Self::KnowledgeBase => "knowledge_base",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryVariant {
    Original,
    Translated,
    Definitional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub variant: QueryVariant,
    pub tier: SearchTier,
}

const fn at(tier: SearchTier) -> Attempt {
    Attempt { variant: QueryVariant::Original, tier }
}

/// Ordered attempts for a strategy.
pub fn attempt_plan(strategy: Strategy) -> Vec<Attempt> {
    use SearchTier::*;
    match strategy {
        Strategy::OfficialFirst => vec![at(Official), at(Academic), at(General), at(KnowledgeBase)],
        Strategy::AcademicFirst => vec![at(Academic), at(Official), at(General), at(KnowledgeBase)],
        Strategy::GeneralFirst => vec![at(General), at(Official), at(KnowledgeBase)],
        Strategy::Multilingual => vec![
            at(General),
            Attempt { variant: QueryVariant::Translated, tier: General },
            Attempt { variant: QueryVariant::Definitional, tier: General },
            at(KnowledgeBase),
        ],
    }
}

/// Spanish/English legal glossary used for the translated variant.
const GLOSSARY: &[(&str, &str)] = &[
    ("ley", "law"),
    ("leyes", "laws"),
    ("contrato", "contract"),
    ("demanda", "lawsuit"),
    ("tribunal", "court"),
    ("sentencia", "ruling"),
    ("derecho", "right"),
    ("derechos", "rights"),
    ("arrendamiento", "lease"),
    ("inquilino", "tenant"),
    ("impuesto", "tax"),
    ("requisitos", "requirements"),
    ("plazo", "deadline"),
    ("despido", "dismissal"),
    ("divorcio", "divorce"),
    ("herencia", "inheritance"),
    ("juez", "judge"),
    ("abogado", "attorney"),
    ("reglamento", "regulation"),
    ("decreto", "decree"),
];

fn translate_word(word: &str, lang: Language) -> Option<&'static str> {
    let to_en = || GLOSSARY.iter().find(|(es, _)| *es == word).map(|(_, en)| *en);
    let to_es = || GLOSSARY.iter().find(|(_, en)| *en == word).map(|(es, _)| *es);
    match lang {
        Language::Es => to_en(),
        Language::En => to_es(),
        Language::Unknown => to_en().or_else(to_es),
    }
}

/// Rewrite `query` for the given variant.
pub fn query_variant(query: &str, variant: QueryVariant) -> String {
    let lang = detect_language(query);
    let core = {
        let words = content_words(query);
        if words.is_empty() {
            query.trim().to_string()
        } else {
            words.join(" ")
        }
    };
    match variant {
        QueryVariant::Original => query.trim().to_string(),
        QueryVariant::Translated => {
            let lower = query.to_lowercase();
            let mut changed = false;
            let translated: Vec<String> = lower
                .split_whitespace()
                .map(|w| match translate_word(w, lang) {
                    Some(t) => {
                        changed = true;
                        t.to_string()
                    }
                    None => w.to_string(),
                })
                .collect();
            if changed {
                translated.join(" ")
            } else {
                core
            }
        }
        QueryVariant::Definitional => match lang {
            Language::Es => format!("definición de {core}"),
            _ => format!("definition of {core}"),
        },
    }
}

/// The provider behind each tier.
pub struct TierProviders {
    pub official: Arc<dyn SearchProvider>,
    pub academic: Arc<dyn SearchProvider>,
    pub general: Arc<dyn SearchProvider>,
    pub knowledge_base: Arc<dyn SearchProvider>,
}

impl TierProviders {
    /// Official and academic tiers as `site:`-scoped views of `general`.
    pub fn scoped(
        general: Arc<dyn SearchProvider>,
        knowledge_base: Arc<dyn SearchProvider>,
        policy: &ScoringPolicy,
    ) -> Self {
        Self {
            official: Arc::new(ScopedSearch::new(
                general.clone(),
                SearchTier::Official.as_str(),
                policy.official_domains().to_vec(),
            )),
            academic: Arc::new(ScopedSearch::new(
                general.clone(),
                SearchTier::Academic.as_str(),
                policy.academic_domains().to_vec(),
            )),
            general,
            knowledge_base,
        }
    }

    fn get(&self, tier: SearchTier) -> &Arc<dyn SearchProvider> {
        match tier {
            SearchTier::Official => &self.official,
            SearchTier::Academic => &self.academic,
            SearchTier::General => &self.general,
            SearchTier::KnowledgeBase => &self.knowledge_base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CascadeSettings {
    pub attempt_timeout: Duration,
    pub extract_top_k: usize,
    pub extract_max_chars: usize,
    /// Per-page bound on extraction; a page that runs over keeps its snippet.
    pub extract_timeout: Duration,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(8),
            extract_top_k: 3,
            extract_max_chars: 5000,
            extract_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CascadeOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        query: String,
        results: Vec<SearchResult>,
        strategy: Strategy,
        source_label: String,
        timestamp: DateTime<Utc>,
    },
    Exhausted { query: String, reason: String },
}

impl CascadeOutcome {
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Success { results, .. } => results,
            Self::Exhausted { .. } => &[],
        }
    }
}

enum CascadeState {
    Attempt(usize),
    Continue(usize),
    Success,
    Exhausted,
}

pub struct CascadeSearch {
    tiers: TierProviders,
    policy: ScoringPolicy,
    extractor: Option<Arc<dyn PageExtractor>>,
    settings: CascadeSettings,
}

impl CascadeSearch {
    pub fn new(tiers: TierProviders, policy: ScoringPolicy, settings: CascadeSettings) -> Self {
        Self {
            tiers,
            policy,
            extractor: None,
            settings,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Run `strategy` for `query` until `desired` results survive scoring.
    ///
    /// Without `force` the first attempt with surviving results ends the
    /// cascade. With `force` results are merged across attempts until
    /// `desired` survive or the plan runs out.
    pub async fn search(
        &self,
        query: &str,
        strategy: Strategy,
        desired: usize,
        force: bool,
    ) -> CascadeOutcome {
        let query = query.trim();
        if query.is_empty() {
            return CascadeOutcome::Exhausted {
                query: String::new(),
                reason: "empty query".into(),
            };
        }
        let desired = desired.max(1);
        let plan = attempt_plan(strategy);
        let mut merged: Vec<SearchResult> = Vec::new();
        let mut notes: Vec<String> = Vec::new();

        let mut state = CascadeState::Attempt(0);
        let exhausted = loop {
            state = match state {
                CascadeState::Attempt(i) => match plan.get(i).copied() {
                    None if merged.is_empty() => CascadeState::Exhausted,
                    None => CascadeState::Success,
                    Some(attempt) => {
                        let q = query_variant(query, attempt.variant);
                        let tier = attempt.tier.as_str();
                        match self.run_attempt(attempt.tier, &q, desired).await {
                            SearchOutcome::Success { results } => {
                                let returned = results.len();
                                let before = merged.len();
                                let mut pool = std::mem::take(&mut merged);
                                pool.extend(results);
                                merged = self.policy.rank(pool, desired);
                                debug!(tier, query = %q, returned, kept = merged.len(), "cascade attempt");
                                if merged.len() == before {
                                    notes.push(format!("{tier}: no usable results"));
                                    CascadeState::Continue(i)
                                } else if !force || merged.len() >= desired {
                                    CascadeState::Success
                                } else {
                                    CascadeState::Continue(i)
                                }
                            }
                            SearchOutcome::Failure { reason } => {
                                warn!(tier, query = %q, "search attempt failed: {reason}");
                                notes.push(format!("{tier}: {reason}"));
                                CascadeState::Continue(i)
                            }
                        }
                    }
                },
                CascadeState::Continue(i) => CascadeState::Attempt(i + 1),
                CascadeState::Success => break false,
                CascadeState::Exhausted => break true,
            };
        };

        if exhausted {
            let reason = if notes.is_empty() {
                "no results".to_string()
            } else {
                format!("no results after {} attempt(s): {}", notes.len(), notes.join("; "))
            };
            info!(query, strategy = strategy.as_str(), "cascade exhausted");
            return CascadeOutcome::Exhausted {
                query: query.to_string(),
                reason,
            };
        }

        self.enrich(&mut merged).await;
        let source_label = source_label(&merged);
        info!(
            query,
            strategy = strategy.as_str(),
            results = merged.len(),
            source = %source_label,
            "cascade succeeded"
        );
        CascadeOutcome::Success {
            query: query.to_string(),
            results: merged,
            strategy,
            source_label,
            timestamp: Utc::now(),
        }
    }

    async fn run_attempt(&self, tier: SearchTier, query: &str, count: usize) -> SearchOutcome {
        let provider = self.tiers.get(tier);
        match tokio::time::timeout(self.settings.attempt_timeout, provider.search(query, count)).await {
            Ok(outcome) => outcome,
            Err(_) => SearchOutcome::failure(format!(
                "timed out after {}s",
                self.settings.attempt_timeout.as_secs()
            )),
        }
    }

    /// Replace the snippets of the top results with extracted page text.
    /// Failures keep the snippet.
    async fn enrich(&self, results: &mut [SearchResult]) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        let k = self.settings.extract_top_k.min(results.len());
        let max_chars = self.settings.extract_max_chars;
        let limit = self.settings.extract_timeout;
        let calls: Vec<_> = results[..k]
            .iter()
            .map(|r| {
                let url = r.url.clone();
                let skip = r.source_label == knowledge_base::LABEL || !url.starts_with("http");
                let extractor = Arc::clone(extractor);
                async move {
                    if skip {
                        return None;
                    }
                    match tokio::time::timeout(limit, extractor.extract(&url)).await {
                        Ok(Ok(text)) => Some(clip(&text, max_chars)),
                        Ok(Err(e)) => {
                            debug!(url = %url, "extraction failed, keeping snippet: {e:#}");
                            None
                        }
                        Err(_) => {
                            debug!(url = %url, timeout_ms = limit.as_millis() as u64, "extraction timed out, keeping snippet");
                            None
                        }
                    }
                }
            })
            .collect();
        let texts = join_all(calls).await;
        for (r, text) in results.iter_mut().zip(texts) {
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                r.snippet = text;
            }
        }
    }
}

/// Distinct result labels in rank order, joined with `+`.
fn source_label(results: &[SearchResult]) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for r in results {
        if !labels.contains(&r.source_label.as_str()) {
            labels.push(&r.source_label);
        }
    }
    labels.join("+")
}
