use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ProviderGate, SearchOutcome, SearchProvider, SearchResult};

const BASE: &str = "https://api.search.brave.com/res/v1";
/// Brave caps `count` at 20.
const MAX_COUNT: usize = 20;

static RE_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// General web search through the Brave Search API.
pub struct BraveSearch {
    http: reqwest::Client,
    base: String,
    api_key: String,
    gate: ProviderGate,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, concurrency: usize, timeout: Duration) -> Self {
        Self::with_base(BASE, api_key, concurrency, timeout)
    }

    pub fn with_base(
        base: impl Into<String>,
        api_key: impl Into<String>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
            api_key: api_key.into(),
            gate: ProviderGate::new(concurrency, timeout),
        }
    }

    async fn fetch(&self, query: &str, count: usize) -> Result<Value> {
        let url = format!(
            "{}/web/search?q={}&count={}",
            self.base,
            urlencoding::encode(query),
            count.clamp(1, MAX_COUNT)
        );
        Ok(self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn label(&self) -> &str {
        "web"
    }

    async fn search(&self, query: &str, count: usize) -> SearchOutcome {
        if self.api_key.is_empty() {
            return SearchOutcome::failure("BRAVE_API_KEY not configured");
        }
        match self.gate.run(self.fetch(query, count)).await {
            Ok(body) => {
                let results = decode_results(&body, self.label());
                debug!(query, results = results.len(), "brave search");
                SearchOutcome::Success { results }
            }
            Err(reason) => {
                warn!(query, "brave search failed: {reason}");
                SearchOutcome::Failure { reason }
            }
        }
    }
}

/// `{"web": {"results": [{"title", "url", "description"}]}}` -> results.
/// Entries without a URL are skipped.
pub fn decode_results(body: &Value, label: &str) -> Vec<SearchResult> {
    let Some(items) = body.pointer("/web/results").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let url = item.get("url")?.as_str()?.trim();
            if url.is_empty() {
                return None;
            }
            let text = |k: &str| item.get(k).and_then(Value::as_str).map(strip_tags).unwrap_or_default();
            Some(SearchResult {
                title: text("title"),
                url: url.to_string(),
                snippet: text("description"),
                score: 0,
                source_label: label.to_string(),
            })
        })
        .collect()
}

fn strip_tags(s: &str) -> String {
    match RE_TAG.as_ref() {
        Some(re) => re.replace_all(s, "").trim().to_string(),
        None => s.trim().to_string(),
    }
}
