use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{SearchOutcome, SearchProvider, SearchResult};
use crate::classifier::tokenize;

pub const LABEL: &str = "knowledge_base";

/// One canned answer, selected when any of its keys appears in the query.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeEntry {
    pub keys: Vec<String>,
    pub title: String,
    pub url: String,
    pub answer: String,
}

/// Last-resort tier: in-process canned answers. Never fails.
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

fn entry(keys: &[&str], title: &str, url: &str, answer: &str) -> KnowledgeEntry {
    KnowledgeEntry {
        keys: keys.iter().map(|k| k.to_string()).collect(),
        title: title.into(),
        url: url.into(),
        answer: answer.into(),
    }
}

fn builtin() -> Vec<KnowledgeEntry> {
    vec![
        entry(
            &["statute of limitations", "limitation period", "prescripción"],
            "Statute of limitations",
            "https://www.law.cornell.edu/wex/statute_of_limitations",
            "A statute of limitations sets the maximum time after an event within which legal proceedings may be started. Once it runs, the claim is generally barred.",
        ),
        entry(
            &["habeas corpus"],
            "Habeas corpus",
            "https://www.law.cornell.edu/wex/habeas_corpus",
            "Habeas corpus is a petition asking a court to determine whether a person's detention is lawful.",
        ),
        entry(
            &["tort", "negligence", "responsabilidad civil"],
            "Tort",
            "https://www.law.cornell.edu/wex/tort",
            "A tort is a civil wrong, other than breach of contract, that causes harm for which the injured party may recover damages.",
        ),
        entry(
            &["small claims", "small-claims"],
            "Small claims court",
            "https://www.uscourts.gov/about-federal-courts/types-cases/civil-cases",
            "Small claims courts resolve disputes over modest amounts with simplified procedure; filing requirements and monetary limits are set by each state.",
        ),
        entry(
            &["filing requirements", "complaint", "demanda", "civil claim"],
            "Filing a civil claim",
            "https://www.uscourts.gov/about-federal-courts/types-cases/civil-cases",
            "A civil case starts when the plaintiff files a complaint with the court, pays the filing fee or requests a waiver, and serves the defendant.",
        ),
        entry(
            &["power of attorney", "poder notarial"],
            "Power of attorney",
            "https://www.law.cornell.edu/wex/power_of_attorney",
            "A power of attorney is a written authorization for one person to act on another's behalf in legal or financial matters.",
        ),
        entry(
            &["lease", "tenant", "landlord", "arrendamiento", "inquilino"],
            "Landlord-tenant law",
            "https://www.law.cornell.edu/wex/landlord-tenant_law",
            "Landlord-tenant law governs the rental of property, including lease terms, habitability, deposits and eviction procedure.",
        ),
    ]
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Built-in entries, plus those in `path` when it is non-empty.
    pub fn with_file(path: &str) -> Self {
        let mut entries = builtin();
        if !path.is_empty() {
            let extra = load_entries(Path::new(path));
            if !extra.is_empty() {
                info!("knowledge base: loaded {} entry/entries from {}", extra.len(), path);
            }
            entries.extend(extra);
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with at least one key in `query`, most matching keys first.
    ///
    /// Keys match on whole words: "lease" does not hit "release".
    pub fn lookup(&self, query: &str) -> Vec<&KnowledgeEntry> {
        let words = tokenize(&query.to_lowercase());
        let mut hits: Vec<(usize, &KnowledgeEntry)> = self
            .entries
            .iter()
            .map(|e| (e.keys.iter().filter(|k| contains_phrase(&words, k)).count(), e))
            .filter(|(n, _)| *n > 0)
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.into_iter().map(|(_, e)| e).collect()
    }
}

/// True when the words of `key` appear contiguously in `words`.
fn contains_phrase(words: &[String], key: &str) -> bool {
    let key = tokenize(&key.to_lowercase());
    !key.is_empty() && words.windows(key.len()).any(|w| w == key.as_slice())
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(builtin())
    }
}

#[async_trait]
impl SearchProvider for KnowledgeBase {
    fn label(&self) -> &str {
        LABEL
    }

    async fn search(&self, query: &str, count: usize) -> SearchOutcome {
        let results = self
            .lookup(query)
            .into_iter()
            .take(count)
            .map(|e| SearchResult {
                title: e.title.clone(),
                url: e.url.clone(),
                snippet: e.answer.clone(),
                score: 0,
                source_label: LABEL.to_string(),
            })
            .collect();
        SearchOutcome::Success { results }
    }
}

fn parse_entry(item: &Value) -> Result<KnowledgeEntry> {
    let mut e: KnowledgeEntry =
        serde_json::from_value(item.clone()).context("expected {keys, title, url, answer}")?;
    e.keys = e
        .keys
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if e.keys.is_empty() {
        anyhow::bail!("entry '{}' has no keys", e.title);
    }
    if e.answer.trim().is_empty() {
        anyhow::bail!("entry '{}' has an empty answer", e.title);
    }
    Ok(e)
}

/// Read a JSON array of entries, skipping malformed ones with a warning.
pub fn load_entries(path: &Path) -> Vec<KnowledgeEntry> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) => {
            warn!("knowledge base: can't read {}: {}", path.display(), e);
            return vec![];
        }
    };
    let v: Value = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(e) => {
            warn!("knowledge base: invalid JSON in {}: {}", path.display(), e);
            return vec![];
        }
    };
    let Some(arr) = v.as_array() else {
        warn!("knowledge base: {} must hold a JSON array", path.display());
        return vec![];
    };

    arr.iter()
        .filter_map(|item| match parse_entry(item) {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("knowledge base: skipping invalid entry: {err:#}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_test::traced_test;

    #[test]
    fn lookup_ranks_by_matching_keys() {
        let kb = KnowledgeBase::default();
        let hits = kb.lookup("Tenant rights under a LEASE");
        assert_eq!(hits[0].title, "Landlord-tenant law");
        assert!(kb.lookup("what is X").is_empty());
    }

    #[test]
    fn keys_match_whole_words_only() {
        let kb = KnowledgeBase::default();
        assert!(kb.lookup("release of liability waiver").is_empty());
        assert!(kb.lookup("please advise on distortion of evidence at trial").is_empty());
        assert_eq!(kb.lookup("is a retort a tort?")[0].title, "Tort");
        assert_eq!(kb.lookup("filing in small-claims court")[0].title, "Small claims court");
    }

    #[tokio::test]
    async fn substring_only_match_is_an_empty_success() {
        let kb = KnowledgeBase::default();
        match kb.search("release of liability waiver enforceability", 3).await {
            SearchOutcome::Success { results } => assert!(results.is_empty()),
            SearchOutcome::Failure { reason } => panic!("{reason}"),
        }
    }

    #[tokio::test]
    async fn search_caps_count_and_labels() {
        let kb = KnowledgeBase::default();
        match kb.search("civil claim filing requirements and statute of limitations", 1).await {
            SearchOutcome::Success { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].source_label, LABEL);
            }
            SearchOutcome::Failure { reason } => panic!("{reason}"),
        }
    }

    #[test]
    #[traced_test]
    fn load_skips_malformed_entries() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"[
                {{"keys": ["Adverse Possession"], "title": "Adverse possession", "url": "https://example.edu/ap", "answer": "Title by occupation."}},
                {{"keys": [], "title": "No keys", "url": "", "answer": "x"}},
                {{"title": "Missing fields"}}
            ]"#
        )
        .unwrap();
        let entries = load_entries(tmp.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keys, vec!["adverse possession"]);
        assert!(logs_contain("skipping invalid entry"));
    }

    #[test]
    #[traced_test]
    fn load_rejects_non_array() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"keys": ["a"]}}"#).unwrap();
        assert!(load_entries(tmp.path()).is_empty());
        assert!(logs_contain("must hold a JSON array"));
    }

    #[test]
    fn with_file_extends_builtin() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"[{{"keys": ["easement"], "title": "Easement", "url": "https://example.edu/e", "answer": "A right of use."}}]"#
        )
        .unwrap();
        let path = tmp.path().to_string_lossy().to_string();
        let kb = KnowledgeBase::with_file(&path);
        assert_eq!(kb.len(), KnowledgeBase::default().len() + 1);
        assert_eq!(kb.lookup("easement over a driveway")[0].title, "Easement");
    }
}
