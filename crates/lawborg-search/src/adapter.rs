use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lawborg_core::source::SourceAdapter;
use lawborg_core::{Evidence, EvidenceType};
use reqwest::Url;
use tracing::debug;

use crate::cascade::{CascadeOutcome, CascadeSearch};
use crate::classifier::QueryClassifier;
use crate::providers::{knowledge_base, SearchResult};

pub const PROVIDER_WEB: &str = "web";

/// Retriever fallback: classify the query, run the cascade, and turn the
/// surviving results into WEB / KNOWLEDGE_BASE evidence.
pub struct CascadeAdapter {
    classifier: Arc<QueryClassifier>,
    cascade: Arc<CascadeSearch>,
    desired: usize,
}

impl CascadeAdapter {
    pub fn new(classifier: Arc<QueryClassifier>, cascade: Arc<CascadeSearch>, desired: usize) -> Self {
        Self {
            classifier,
            cascade,
            desired: desired.max(1),
        }
    }
}

#[async_trait]
impl SourceAdapter for CascadeAdapter {
    fn id(&self) -> &str {
        PROVIDER_WEB
    }

    async fn search(&self, query: &str) -> Vec<Evidence> {
        let c = self.classifier.classify(query);
        match self
            .cascade
            .search(&c.normalized_query, c.strategy, self.desired, false)
            .await
        {
            CascadeOutcome::Success { results, .. } => {
                let accessed = Utc::now().format("%Y-%m-%d").to_string();
                results.iter().map(|r| to_evidence(r, &accessed)).collect()
            }
            CascadeOutcome::Exhausted { reason, .. } => {
                debug!(query, "cascade found nothing: {reason}");
                Vec::new()
            }
        }
    }
}

/// Web results carry no publication date, so the access date stands in.
pub fn to_evidence(r: &SearchResult, accessed: &str) -> Evidence {
    let kb = r.source_label == knowledge_base::LABEL;
    let issuing_body = if kb {
        "Knowledge base".to_string()
    } else {
        Url::parse(&r.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| r.source_label.clone())
    };
    Evidence {
        id: String::new(),
        evidence_type: if kb {
            EvidenceType::KnowledgeBase
        } else {
            EvidenceType::Web
        },
        issuing_body,
        date: accessed.to_string(),
        citation: r.title.clone(),
        author: None,
        text: r.snippet.clone(),
        url: r.url.clone(),
        content_hash: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{CascadeSettings, TierProviders};
    use crate::providers::knowledge_base::KnowledgeBase;
    use crate::providers::{SearchOutcome, SearchProvider};
    use crate::scoring::ScoringPolicy;

    struct Down;

    #[async_trait]
    impl SearchProvider for Down {
        fn label(&self) -> &str {
            "web"
        }

        async fn search(&self, _query: &str, _count: usize) -> SearchOutcome {
            SearchOutcome::failure("offline")
        }
    }

    fn adapter() -> CascadeAdapter {
        let policy = ScoringPolicy::new(vec![".gov".into()], vec![".edu".into()], vec!["wikipedia.org".into()]);
        let tiers = TierProviders::scoped(Arc::new(Down), Arc::new(KnowledgeBase::default()), &policy);
        CascadeAdapter::new(
            Arc::new(QueryClassifier::new("United States", vec!["federal".into()])),
            Arc::new(CascadeSearch::new(tiers, policy, CascadeSettings::default())),
            3,
        )
    }

    #[tokio::test]
    async fn falls_through_to_knowledge_base_evidence() {
        let ev = adapter().search("statute of limitations for a tort claim").await;
        assert!(!ev.is_empty());
        assert!(ev.iter().all(|e| e.evidence_type == EvidenceType::KnowledgeBase));
        assert!(ev.iter().all(|e| !e.url.is_empty() && e.date.len() == 10));
    }

    #[tokio::test]
    async fn nothing_found_is_empty() {
        assert!(adapter().search("what is X").await.is_empty());
    }

    #[test]
    fn web_result_uses_host_as_issuing_body() {
        let r = SearchResult {
            title: "Lease rules".into(),
            url: "https://www.ecfr.gov/current/title-24".into(),
            snippet: "Part 982".into(),
            score: 3,
            source_label: "official".into(),
        };
        let e = to_evidence(&r, "2026-01-01");
        assert_eq!(e.evidence_type, EvidenceType::Web);
        assert_eq!(e.issuing_body, "ecfr.gov");
        assert_eq!(e.citation, "Lease rules");
    }
}
