use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use crate::agent::LanguageModel;
use crate::prompt::{DraftPrompt, EvidenceBlock};
use crate::types::{Claim, Draft, Plan};

static RE_CITATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z0-9]+-E\d+)\]").ok());

/// Optional model pass that rewrites evidence-backed sections into prose.
///
/// A rewrite is kept only if it is non-empty and cites nothing outside the
/// section's own evidence; otherwise the deterministic section stays.
pub struct Refiner {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl Refiner {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model_id(&self) -> String {
        self.model.model_id()
    }

    /// Returns the refined draft and one log line per section attempted.
    pub async fn refine(&self, plan: &Plan, claims: &[Claim], draft: &Draft) -> (Draft, Vec<String>) {
        let mut out = draft.clone();
        let mut log = Vec::new();

        for section in out.sections.iter_mut().filter(|s| !s.cited_evidence.is_empty()) {
            let evidence = claims
                .iter()
                .filter(|c| c.is_supported())
                .flat_map(|c| c.evidence.iter())
                .filter(|e| section.cited_evidence.contains(&e.id));
            let prompt = DraftPrompt {
                section: section.title.clone(),
                objective: plan.objective.clone(),
                audience: plan.audience.clone(),
                jurisdiction: plan.jurisdiction.clone(),
                draft_content: section.content.clone(),
                evidence: EvidenceBlock::from_evidence(evidence),
            };

            let rewritten = match tokio::time::timeout(self.timeout, self.model.generate(&prompt)).await {
                Ok(Ok(text)) => text.trim().to_string(),
                Ok(Err(e)) => {
                    warn!(section = %section.title, "refine failed: {e}");
                    log.push(format!("refine {}: model error, kept template", section.title));
                    continue;
                }
                Err(_) => {
                    warn!(section = %section.title, timeout_s = self.timeout.as_secs(), "refine timed out");
                    log.push(format!("refine {}: timed out, kept template", section.title));
                    continue;
                }
            };

            if rewritten.is_empty() {
                log.push(format!("refine {}: empty output, kept template", section.title));
                continue;
            }
            let foreign = foreign_citations(&rewritten, &section.cited_evidence);
            if !foreign.is_empty() {
                warn!(section = %section.title, ?foreign, "refined text cites unknown evidence");
                log.push(format!(
                    "refine {}: rejected, cites unknown evidence {}",
                    section.title,
                    foreign.join(",")
                ));
                continue;
            }

            info!(section = %section.title, chars = rewritten.len(), "section refined");
            log.push(format!("refine {}: accepted", section.title));
            section.cited_evidence = cited_ids(&rewritten);
            section.content = rewritten;
        }

        out.text = Draft::compose(&out.sections);
        (out, log)
    }
}

/// Citation ids in `text`, first-occurrence order, no duplicates.
pub fn cited_ids(text: &str) -> Vec<String> {
    let Some(re) = RE_CITATION.as_ref() else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::new();
    for cap in re.captures_iter(text) {
        if !out.iter().any(|o| o == &cap[1]) {
            out.push(cap[1].to_string());
        }
    }
    out
}

/// Citation ids in `text` that are not in `allowed`.
pub fn foreign_citations(text: &str, allowed: &[String]) -> Vec<String> {
    cited_ids(text)
        .into_iter()
        .filter(|id| !allowed.contains(id))
        .collect()
}
