use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lawborg_core::config::parse_list;
use lawborg_core::source::SourceAdapter;
use lawborg_search::classifier::Category;
use lawborg_search::providers::knowledge_base::KnowledgeBase;
use lawborg_search::providers::{SearchOutcome, SearchProvider, SearchResult};
use lawborg_search::{
    CascadeAdapter, CascadeOutcome, CascadeSearch, CascadeSettings, QueryClassifier,
    ScoringPolicy, Strategy, TierProviders,
};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Answers only `site:`-scoped queries, like an index that only holds
/// official pages.
struct OfficialOnlyIndex;

#[async_trait]
impl SearchProvider for OfficialOnlyIndex {
    fn label(&self) -> &str {
        "web"
    }

    async fn search(&self, query: &str, _count: usize) -> SearchOutcome {
        if !query.contains("site:gov") {
            return SearchOutcome::Success { results: Vec::new() };
        }
        SearchOutcome::Success {
            results: vec![
                result("https://www.ecfr.gov/current/title-28", "28 CFR"),
                result("https://en.wikipedia.org/wiki/Small_claims_court", "Wiki"),
                result("https://www.ecfr.gov/current/title-28/", "28 CFR duplicate"),
            ],
        }
    }
}

fn result(url: &str, title: &str) -> SearchResult {
    SearchResult {
        title: title.into(),
        url: url.into(),
        snippet: "snippet".into(),
        score: 0,
        source_label: "web".into(),
    }
}

fn policy() -> ScoringPolicy {
    ScoringPolicy::new(
        parse_list(".gov,courtlistener.com"),
        parse_list(".edu,ssrn.com"),
        parse_list("wikipedia.org"),
    )
}

fn classifier() -> QueryClassifier {
    QueryClassifier::new("United States", parse_list("united states,u.s.,federal"))
}

fn cascade(general: Arc<dyn SearchProvider>) -> CascadeSearch {
    let policy = policy();
    let tiers = TierProviders::scoped(general, Arc::new(KnowledgeBase::default()), &policy);
    CascadeSearch::new(
        tiers,
        policy,
        CascadeSettings {
            attempt_timeout: Duration::from_secs(2),
            ..Default::default()
        },
    )
}

// ── classification drives the cascade ────────────────────────────────────────

#[tokio::test]
async fn legal_query_is_served_by_official_tier() {
    let c = classifier().classify("small claims court filing requirements statute");
    assert_eq!(c.category, Category::Legal);
    assert_eq!(c.strategy, Strategy::OfficialFirst);

    let out = cascade(Arc::new(OfficialOnlyIndex))
        .search(&c.normalized_query, c.strategy, 5, false)
        .await;
    match out {
        CascadeOutcome::Success { results, source_label, .. } => {
            assert_eq!(results.len(), 1, "blocked and duplicate results are dropped");
            assert_eq!(results[0].score, 3);
            assert_eq!(source_label, "official");
        }
        CascadeOutcome::Exhausted { reason, .. } => panic!("{reason}"),
    }
}

#[tokio::test]
async fn undefined_query_goes_multilingual_and_exhausts_cleanly() {
    let c = classifier().classify("what is X");
    assert_eq!(c.category, Category::Undefined);
    assert_eq!(c.confidence, 0.0);
    assert_eq!(c.strategy, Strategy::Multilingual);

    let out = cascade(Arc::new(OfficialOnlyIndex))
        .search(&c.normalized_query, c.strategy, 5, false)
        .await;
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["outcome"], "exhausted");
    assert!(json["reason"].as_str().unwrap().contains("no results"));
}

#[tokio::test]
async fn success_outcome_serializes_in_camel_case() {
    let c = classifier().classify("statute on small claims filing");
    let out = cascade(Arc::new(OfficialOnlyIndex))
        .search(&c.normalized_query, c.strategy, 5, false)
        .await;
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["outcome"], "success");
    assert_eq!(json["strategy"], "official-first");
    assert_eq!(json["sourceLabel"], "official");
    assert_eq!(json["results"][0]["sourceLabel"], "official");
}

#[tokio::test]
async fn cascade_adapter_emits_web_evidence() {
    let adapter = CascadeAdapter::new(
        Arc::new(classifier()),
        Arc::new(cascade(Arc::new(OfficialOnlyIndex))),
        3,
    );
    assert_eq!(adapter.id(), "web");
    let ev = adapter.search("small claims filing statute").await;
    assert_eq!(ev.len(), 1);
    assert_eq!(ev[0].issuing_body, "ecfr.gov");
    assert_eq!(ev[0].url, "https://www.ecfr.gov/current/title-28");
}
