use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lawborg_core::{agent::LanguageModel, prompt::DraftPrompt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::instruction::{build_messages, clean_output};

/// Calls a locally-hosted Ollama model via its native chat API.
///
/// Keeps client material on the local machine; the refiner falls back to
/// the template text whenever this returns an error.
pub struct OllamaModel {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn generate(&self, prompt: &DraftPrompt) -> Result<String> {
        let messages = build_messages(prompt);
        let request_body = OllamaChatRequest {
            model: &self.model,
            messages: messages
                .chat_turns()
                .into_iter()
                .map(|(role, content)| OllamaMessage { role, content })
                .collect(),
            stream: false,
        };

        info!(
            section = %prompt.section,
            model = %self.model,
            base_url = %self.base_url,
            "calling ollama chat API"
        );

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()?;

        let response = match client.post(&url).json(&request_body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(
                    section = %prompt.section,
                    timeout_secs = self.timeout_secs,
                    "ollama request timed out"
                );
                bail!("ollama request timed out after {}s", self.timeout_secs);
            }
            Err(e) => {
                warn!(section = %prompt.section, "ollama request failed: {}", e);
                bail!("ollama request failed: {e}");
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(section = %prompt.section, status = %status, "ollama returned non-200: {}", body);
            bail!("ollama error {status}: {body}");
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .context("failed to parse ollama response")?;
        let output = clean_output(&parsed.message.content);

        info!(section = %prompt.section, output_len = output.len(), "ollama response received");
        Ok(output)
    }
}
