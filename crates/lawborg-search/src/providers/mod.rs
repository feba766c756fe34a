pub mod brave;
pub mod knowledge_base;
pub mod reader;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Set by the scoring policy; providers leave it at 0.
    #[serde(default)]
    pub score: u32,
    pub source_label: String,
}

/// A provider response, decoded once at the provider boundary.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Success { results: Vec<SearchResult> },
    Failure { reason: String },
}

impl SearchOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure { reason: reason.into() }
    }
}

/// A search backend used by the cascade. Never errors: transport and
/// decoding problems come back as [`SearchOutcome::Failure`].
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn label(&self) -> &str;

    async fn search(&self, query: &str, count: usize) -> SearchOutcome;
}

/// Per-provider concurrency cap plus request timeout.
pub struct ProviderGate {
    permits: Semaphore,
    timeout: Duration,
}

impl ProviderGate {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            permits: Semaphore::new(concurrency.max(1)),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` under a permit and the timeout, flattening every failure
    /// into a reason string.
    pub async fn run<T, F>(&self, call: F) -> Result<T, String>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| "provider is shutting down".to_string())?;
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("timed out after {}s", self.timeout.as_secs())),
        }
    }
}

/// Restricts a general provider to a set of domains with `site:` operators.
pub struct ScopedSearch {
    inner: Arc<dyn SearchProvider>,
    label: String,
    domains: Vec<String>,
}

impl ScopedSearch {
    pub fn new(inner: Arc<dyn SearchProvider>, label: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            inner,
            label: label.into(),
            domains,
        }
    }

    pub fn scoped_query(&self, query: &str) -> String {
        let sites: Vec<String> = self
            .domains
            .iter()
            .map(|d| d.trim().trim_start_matches('.'))
            .filter(|d| !d.is_empty())
            .map(|d| format!("site:{d}"))
            .collect();
        match sites.len() {
            0 => query.to_string(),
            1 => format!("{query} {}", sites[0]),
            _ => format!("{query} ({})", sites.join(" OR ")),
        }
    }
}

#[async_trait]
impl SearchProvider for ScopedSearch {
    fn label(&self) -> &str {
        &self.label
    }

    async fn search(&self, query: &str, count: usize) -> SearchOutcome {
        match self.inner.search(&self.scoped_query(query), count).await {
            SearchOutcome::Success { results } => SearchOutcome::Success {
                results: results
                    .into_iter()
                    .map(|mut r| {
                        r.source_label = self.label.clone();
                        r
                    })
                    .collect(),
            },
            failure => failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl SearchProvider for Echo {
        fn label(&self) -> &str {
            "web"
        }

        async fn search(&self, query: &str, _count: usize) -> SearchOutcome {
            SearchOutcome::Success {
                results: vec![SearchResult {
                    title: query.into(),
                    url: "https://example.gov".into(),
                    snippet: String::new(),
                    score: 0,
                    source_label: "web".into(),
                }],
            }
        }
    }

    #[test]
    fn scoped_query_joins_sites() {
        let s = ScopedSearch::new(Arc::new(Echo), "official", vec![".gov".into(), "ecfr.gov".into()]);
        assert_eq!(s.scoped_query("lease"), "lease (site:gov OR site:ecfr.gov)");
        let one = ScopedSearch::new(Arc::new(Echo), "official", vec!["ecfr.gov".into()]);
        assert_eq!(one.scoped_query("lease"), "lease site:ecfr.gov");
    }

    #[tokio::test]
    async fn scoped_search_relabels_results() {
        let s = ScopedSearch::new(Arc::new(Echo), "official", vec!["ecfr.gov".into()]);
        match s.search("lease", 5).await {
            SearchOutcome::Success { results } => {
                assert_eq!(results[0].title, "lease site:ecfr.gov");
                assert_eq!(results[0].source_label, "official");
            }
            SearchOutcome::Failure { reason } => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn gate_times_out() {
        let gate = ProviderGate::new(1, Duration::from_millis(20));
        let r: Result<(), String> = gate
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(r.unwrap_err().contains("timed out"));
    }

    #[tokio::test]
    async fn gate_flattens_errors() {
        let gate = ProviderGate::new(1, Duration::from_secs(1));
        let r: Result<(), String> = gate.run(async { Err(anyhow::anyhow!("boom")) }).await;
        assert_eq!(r.unwrap_err(), "boom");
    }
}
