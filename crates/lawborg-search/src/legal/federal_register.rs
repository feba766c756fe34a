use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lawborg_core::planner::PROVIDER_OFFICIAL_REGISTRY;
use lawborg_core::source::SourceAdapter;
use lawborg_core::{Evidence, EvidenceType};
use serde_json::Value;
use tracing::{debug, warn};

use crate::providers::ProviderGate;

const BASE: &str = "https://www.federalregister.gov/api/v1";
const ISSUING_BODY: &str = "Federal Register";

/// Official registry adapter: Federal Register documents API -> NORM evidence.
pub struct FederalRegisterClient {
    http: reqwest::Client,
    base: String,
    per_page: usize,
    gate: ProviderGate,
}

impl FederalRegisterClient {
    pub fn new(per_page: usize, concurrency: usize, timeout: Duration) -> Self {
        Self::with_base(BASE, per_page, concurrency, timeout)
    }

    pub fn with_base(base: impl Into<String>, per_page: usize, concurrency: usize, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
            per_page: per_page.max(1),
            gate: ProviderGate::new(concurrency, timeout),
        }
    }

    async fn fetch(&self, term: &str) -> Result<Value> {
        let url = format!(
            "{}/documents.json?conditions[term]={}&per_page={}&order=relevance",
            self.base,
            urlencoding::encode(term),
            self.per_page
        );
        Ok(self.http.get(&url).send().await?.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl SourceAdapter for FederalRegisterClient {
    fn id(&self) -> &str {
        PROVIDER_OFFICIAL_REGISTRY
    }

    async fn search(&self, query: &str) -> Vec<Evidence> {
        match self.gate.run(self.fetch(query)).await {
            Ok(body) => {
                let evidence = decode_documents(&body);
                debug!(query, found = evidence.len(), "federal register search");
                evidence
            }
            Err(reason) => {
                warn!(query, "federal register search failed: {reason}");
                Vec::new()
            }
        }
    }
}

/// Documents without an `html_url` are skipped: evidence must be traceable.
pub fn decode_documents(body: &Value) -> Vec<Evidence> {
    let Some(items) = body.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|doc| {
            let s = |k: &str| doc.get(k).and_then(Value::as_str).unwrap_or_default().trim().to_string();
            let url = s("html_url");
            if url.is_empty() {
                return None;
            }
            let agency = doc
                .pointer("/agencies/0/name")
                .and_then(Value::as_str)
                .map(|a| format!("{ISSUING_BODY} ({a})"))
                .unwrap_or_else(|| ISSUING_BODY.to_string());
            let citation = match (s("citation"), s("document_number")) {
                (c, _) if !c.is_empty() => c,
                (_, n) if !n.is_empty() => format!("FR Doc. {n}"),
                _ => String::new(),
            };
            let title = s("title");
            let text = match s("abstract") {
                a if a.is_empty() => title,
                a if title.is_empty() => a,
                a => format!("{title}. {a}"),
            };
            Some(Evidence {
                id: String::new(),
                evidence_type: EvidenceType::Norm,
                issuing_body: agency,
                date: s("publication_date"),
                citation,
                author: None,
                text,
                url,
                content_hash: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_documents() {
        let body = json!({
            "count": 2,
            "results": [
                {
                    "title": "Small Claims Procedures",
                    "abstract": "This rule updates filing requirements.",
                    "document_number": "2024-01234",
                    "citation": "89 FR 4567",
                    "publication_date": "2024-02-01",
                    "html_url": "https://www.federalregister.gov/documents/2024/02/01/2024-01234/small-claims",
                    "agencies": [{"name": "Justice Department"}]
                },
                {"title": "No link", "document_number": "2024-9"}
            ]
        });
        let ev = decode_documents(&body);
        assert_eq!(ev.len(), 1);
        let e = &ev[0];
        assert_eq!(e.evidence_type, EvidenceType::Norm);
        assert_eq!(e.issuing_body, "Federal Register (Justice Department)");
        assert_eq!(e.citation, "89 FR 4567");
        assert_eq!(e.date, "2024-02-01");
        assert_eq!(e.text, "Small Claims Procedures. This rule updates filing requirements.");
    }

    #[test]
    fn falls_back_to_document_number() {
        let body = json!({"results": [{
            "title": "T", "document_number": "2023-555", "html_url": "https://www.federalregister.gov/d/2023-555"
        }]});
        let ev = decode_documents(&body);
        assert_eq!(ev[0].citation, "FR Doc. 2023-555");
        assert_eq!(ev[0].issuing_body, "Federal Register");
        assert_eq!(ev[0].text, "T");
    }

    #[test]
    fn missing_results_is_empty() {
        assert!(decode_documents(&json!({"errors": ["bad"]})).is_empty());
    }

    #[tokio::test]
    async fn unreachable_registry_yields_no_evidence() {
        let client = FederalRegisterClient::with_base("http://127.0.0.1:9", 5, 1, Duration::from_secs(2));
        assert!(client.search("small claims").await.is_empty());
    }
}
