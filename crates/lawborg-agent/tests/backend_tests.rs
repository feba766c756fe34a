use std::path::Path;

use lawborg_agent::{model_from_config, OllamaModel};
use lawborg_core::agent::LanguageModel;
use lawborg_core::config::Config;
use lawborg_core::prompt::{DraftPrompt, EvidenceBlock};
use tracing_test::traced_test;

// ── helpers ──────────────────────────────────────────────────────────────────

fn config(backend: &str) -> Config {
    let mut c = Config::load(Path::new("/nonexistent/lawborg-agent-test.env")).unwrap();
    c.backend = backend.into();
    c.model = "test-model".into();
    c.anthropic_api_key = "sk-test".into();
    c
}

fn prompt() -> DraftPrompt {
    DraftPrompt {
        section: "Normative framework".into(),
        objective: "explain filing requirements".into(),
        audience: "general public".into(),
        jurisdiction: "United States".into(),
        draft_content: "Rules apply. [C1-E1]".into(),
        evidence: EvidenceBlock::default(),
    }
}

// ── backend selection ────────────────────────────────────────────────────────

#[test]
fn none_backend_means_template_only() {
    assert!(model_from_config(&config("none")).unwrap().is_none());
    assert!(model_from_config(&config("")).unwrap().is_none());
}

#[test]
fn known_backends_report_their_model_id() {
    let ollama = model_from_config(&config("ollama")).unwrap().unwrap();
    assert_eq!(ollama.model_id(), "ollama:test-model");
    let anthropic = model_from_config(&config("anthropic")).unwrap().unwrap();
    assert_eq!(anthropic.model_id(), "anthropic:test-model");
}

#[test]
fn unknown_backend_is_rejected() {
    let err = model_from_config(&config("gpt")).err().unwrap();
    assert!(err.to_string().contains("unknown BACKEND"));
}

// ── failure logging ──────────────────────────────────────────────────────────

#[tokio::test]
#[traced_test]
async fn unreachable_ollama_logs_and_errors() {
    let model = OllamaModel::new("http://127.0.0.1:9", "llama3.1").with_timeout(2);
    let err = model.generate(&prompt()).await.unwrap_err();
    assert!(err.to_string().contains("ollama request"));
    assert!(logs_contain("calling ollama chat API"));
    assert!(logs_contain("ollama request"));
}
