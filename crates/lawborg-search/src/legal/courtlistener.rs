use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lawborg_core::planner::PROVIDER_JURISPRUDENCE;
use lawborg_core::source::SourceAdapter;
use lawborg_core::{Evidence, EvidenceType};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::providers::ProviderGate;

const BASE: &str = "https://www.courtlistener.com/api/rest/v4";
const SITE: &str = "https://www.courtlistener.com";
const LABEL: &str = "CourtListener";

/// Jurisprudence adapter: CourtListener opinion search -> RULING evidence.
pub struct CourtListenerClient {
    http: reqwest::Client,
    base: String,
    token: String,
    max_results: usize,
    gate: ProviderGate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Value>,
    pub next: Option<String>,
}

impl CourtListenerClient {
    pub fn new(token: impl Into<String>, max_results: usize, concurrency: usize, timeout: Duration) -> Self {
        Self::with_base(BASE, token, max_results, concurrency, timeout)
    }

    pub fn with_base(
        base: impl Into<String>,
        token: impl Into<String>,
        max_results: usize,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent("lawborg/0.1 (evidence retrieval)")
                .build()
                .unwrap_or_default(),
            base: base.into(),
            token: token.into(),
            max_results: max_results.max(1),
            gate: ProviderGate::new(concurrency, timeout),
        }
    }

    async fn search_opinions(&self, query: &str) -> Result<SearchPage> {
        let url = format!("{}/search/?q={}&type=o", self.base, urlencoding::encode(query));
        let mut req = self.http.get(&url);
        if !self.token.is_empty() {
            req = req.header("Authorization", format!("Token {}", self.token));
        }
        Ok(req.send().await?.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl SourceAdapter for CourtListenerClient {
    fn id(&self) -> &str {
        PROVIDER_JURISPRUDENCE
    }

    async fn search(&self, query: &str) -> Vec<Evidence> {
        match self.gate.run(self.search_opinions(query)).await {
            Ok(page) => {
                let mut evidence = decode_opinions(&page);
                evidence.truncate(self.max_results);
                debug!(query, total = page.count, found = evidence.len(), "courtlistener search");
                evidence
            }
            Err(reason) => {
                warn!(query, "courtlistener search failed: {reason}");
                Vec::new()
            }
        }
    }
}

/// Opinion clusters without an `absolute_url` are skipped.
pub fn decode_opinions(page: &SearchPage) -> Vec<Evidence> {
    page.results
        .iter()
        .filter_map(|hit| {
            let s = |k: &str| hit.get(k).and_then(Value::as_str).unwrap_or_default().trim().to_string();
            let path = s("absolute_url");
            if path.is_empty() {
                return None;
            }
            let case_name = s("caseName");
            let reporter = hit
                .get("citation")
                .and_then(Value::as_array)
                .and_then(|c| c.first())
                .and_then(Value::as_str)
                .unwrap_or_default();
            let citation = match (case_name.is_empty(), reporter.is_empty()) {
                (false, false) => format!("{case_name}, {reporter}"),
                (false, true) => case_name.clone(),
                (true, _) => reporter.to_string(),
            };
            let court = match s("court") {
                c if c.is_empty() => LABEL.to_string(),
                c => format!("{LABEL} ({c})"),
            };
            let judge = s("judge");
            let snippet = hit
                .pointer("/opinions/0/snippet")
                .and_then(Value::as_str)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| case_name.clone());
            let url = if path.starts_with("http") {
                path
            } else {
                format!("{SITE}{path}")
            };
            Some(Evidence {
                id: String::new(),
                evidence_type: EvidenceType::Ruling,
                issuing_body: court,
                date: s("dateFiled").chars().take(10).collect(),
                citation,
                author: (!judge.is_empty()).then_some(judge),
                text: snippet,
                url,
                content_hash: None,
            })
        })
        .collect()
}
