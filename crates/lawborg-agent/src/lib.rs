pub mod anthropic;
pub mod instruction;
pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use lawborg_core::{agent::LanguageModel, config::Config};

pub use anthropic::AnthropicModel;
pub use ollama::OllamaModel;

/// Model backend selected by `BACKEND`; `None` for the template-only path.
pub fn model_from_config(config: &Config) -> Result<Option<Arc<dyn LanguageModel>>> {
    let model: Arc<dyn LanguageModel> = match config.backend.as_str() {
        "" | "none" => return Ok(None),
        "ollama" => Arc::new(
            OllamaModel::new(&config.ollama_url, &config.model).with_timeout(config.model_timeout_s),
        ),
        "anthropic" => Arc::new(AnthropicModel::new(
            &config.anthropic_api_key,
            &config.model,
            Duration::from_secs(config.model_timeout_s),
        )),
        other => bail!("unknown BACKEND '{other}' (expected none, ollama or anthropic)"),
    };
    Ok(Some(model))
}
