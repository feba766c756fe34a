use anyhow::Result;
use async_trait::async_trait;

use crate::prompt::DraftPrompt;

/// A text-generation backend used to polish drafted sections.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier recorded in the traceability record (e.g. "ollama:llama3.1").
    fn model_id(&self) -> String;

    async fn generate(&self, prompt: &DraftPrompt) -> Result<String>;
}
