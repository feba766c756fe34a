use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lawborg_core::{agent::LanguageModel, prompt::DraftPrompt};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::instruction::{build_messages, clean_output};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API backend.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self::with_url(API_URL, api_key, model, timeout)
    }

    pub fn with_url(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request_body(&self, prompt: &DraftPrompt) -> Value {
        let m = build_messages(prompt);
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": m.system,
            "messages": [
                {"role": "user", "content": [
                    {"type": "text", "text": m.draft},
                    {"type": "text", "text": m.evidence}
                ]}
            ]
        })
    }
}

/// Concatenated text blocks of a Messages API response.
pub fn response_text(resp: &Value) -> Option<String> {
    let blocks = resp.get("content")?.as_array()?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    fn model_id(&self) -> String {
        format!("anthropic:{}", self.model)
    }

    async fn generate(&self, prompt: &DraftPrompt) -> Result<String> {
        info!(section = %prompt.section, model = %self.model, "calling anthropic messages API");

        let resp = self
            .client
            .post(&self.api_url)
            .header("content-type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(prompt))
            .send()
            .await
            .context("anthropic request failed")?;

        let status = resp.status();
        let body: Value = resp.json().await.context("failed to parse anthropic response")?;
        if !status.is_success() {
            let msg = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            warn!(section = %prompt.section, status = %status, "anthropic returned an error: {msg}");
            bail!("anthropic error {status}: {msg}");
        }

        let Some(text) = response_text(&body) else {
            bail!("anthropic response had no text content");
        };
        let output = clean_output(&text);
        info!(section = %prompt.section, output_len = output.len(), "anthropic response received");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawborg_core::prompt::EvidenceBlock;

    fn prompt() -> DraftPrompt {
        DraftPrompt {
            section: "Analysis".into(),
            objective: "explain filing requirements".into(),
            audience: "general public".into(),
            jurisdiction: "United States".into(),
            draft_content: "- Point (see [C1-E1])".into(),
            evidence: EvidenceBlock::default(),
        }
    }

    #[test]
    fn body_separates_policy_from_data() {
        let m = AnthropicModel::new("k", "claude-sonnet-4-6", Duration::from_secs(5));
        let body = m.request_body(&prompt());
        assert!(body["system"].as_str().unwrap().contains("Never invent ids"));
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0]["text"].as_str().unwrap().starts_with("DRAFT"));
        assert!(parts[1]["text"].as_str().unwrap().starts_with("EVIDENCE"));
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let resp = json!({"content": [
            {"type": "text", "text": "Hello "},
            {"type": "tool_use", "id": "x"},
            {"type": "text", "text": "world"}
        ]});
        assert_eq!(response_text(&resp).as_deref(), Some("Hello world"));
        assert_eq!(response_text(&json!({"content": []})), None);
    }

    #[tokio::test]
    async fn closed_port_is_an_error() {
        let m = AnthropicModel::with_url("http://127.0.0.1:9/v1/messages", "k", "m", Duration::from_secs(2));
        assert!(m.generate(&prompt()).await.is_err());
    }
}
