use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::types::{Claim, Draft, GuardrailResult, Plan, QualityMetrics, VerificationReport};

pub const RULE_SUPPORT_RATIO: &str = "evidence_support_ratio";
pub const RULE_REGISTER: &str = "register";
pub const RULE_CONFIDENTIALITY: &str = "confidentiality";

/// Archaic formulas the drafts must not use.
const ARCHAIC_MARKERS: &[&str] = &[
    "witnesseth",
    "heretofore",
    "hereinbefore",
    "aforesaid",
    "know all men by these presents",
    "in witness whereof",
    "otrosí digo",
    "a mayor abundamiento",
    "por medio del presente",
    "so pena de",
];

static RE_LONG_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d{8,}\b").ok());
static RE_SSN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").ok());

/// Deterministic quality gate over a draft. No I/O.
pub struct Verifier {
    support_threshold: f64,
}

impl Verifier {
    pub fn new(support_threshold: f64) -> Self {
        Self { support_threshold }
    }

    pub fn verify(&self, plan: &Plan, draft: &Draft, claims: &[Claim]) -> VerificationReport {
        let guardrails = vec![
            self.support_ratio(claims),
            check_register(&draft.text),
            check_confidentiality(&draft.text),
        ];
        let metrics = metrics(plan, draft, claims);
        let report = VerificationReport::new(guardrails, metrics);
        info!(
            approved = report.approved,
            faithfulness = metrics.faithfulness,
            failed = report.observations.len(),
            "verification complete"
        );
        report
    }

    fn support_ratio(&self, claims: &[Claim]) -> GuardrailResult {
        let ratio = supported_ratio(claims);
        GuardrailResult {
            rule: RULE_SUPPORT_RATIO.into(),
            passed: !claims.is_empty() && ratio >= self.support_threshold,
            detail: format!(
                "{} of {} claims supported ({:.0}%, minimum {:.0}%)",
                claims.iter().filter(|c| c.is_supported()).count(),
                claims.len(),
                ratio * 100.0,
                self.support_threshold * 100.0
            ),
        }
    }
}

fn supported_ratio(claims: &[Claim]) -> f64 {
    if claims.is_empty() {
        return 0.0;
    }
    claims.iter().filter(|c| c.is_supported()).count() as f64 / claims.len() as f64
}

pub fn check_register(text: &str) -> GuardrailResult {
    let lower = text.to_lowercase();
    let found: Vec<&str> = ARCHAIC_MARKERS
        .iter()
        .copied()
        .filter(|m| lower.contains(m))
        .collect();
    GuardrailResult {
        rule: RULE_REGISTER.into(),
        passed: found.is_empty(),
        detail: if found.is_empty() {
            "no archaic phrasing found".into()
        } else {
            format!("archaic phrasing found: {}", found.join(", "))
        },
    }
}

pub fn check_confidentiality(text: &str) -> GuardrailResult {
    let hits = [&*RE_LONG_NUMBER, &*RE_SSN]
        .into_iter()
        .flatten()
        .map(|re| re.find_iter(text).count())
        .sum::<usize>();
    GuardrailResult {
        rule: RULE_CONFIDENTIALITY.into(),
        passed: hits == 0,
        detail: if hits == 0 {
            "no personal identifiers found".into()
        } else {
            format!("{hits} possible personal identifier(s) found")
        },
    }
}

fn metrics(plan: &Plan, draft: &Draft, claims: &[Claim]) -> QualityMetrics {
    QualityMetrics {
        faithfulness: supported_ratio(claims),
        context_relevance: context_relevance(&plan.topic, draft, claims),
        answer_relevance: term_coverage(&plan.objective, &draft.text),
    }
}

/// Share of cited evidence whose text or citation mentions a topic term.
fn context_relevance(topic: &str, draft: &Draft, claims: &[Claim]) -> f64 {
    let terms = terms(topic);
    let cited: HashSet<&str> = draft.cited_evidence().into_iter().collect();
    let evidence: Vec<_> = claims
        .iter()
        .flat_map(|c| c.evidence.iter())
        .filter(|e| cited.contains(e.id.as_str()))
        .collect();
    if evidence.is_empty() || terms.is_empty() {
        return 0.0;
    }
    let relevant = evidence
        .iter()
        .filter(|e| {
            let hay = format!("{} {}", e.text, e.citation).to_lowercase();
            terms.iter().any(|t| hay.contains(t.as_str()))
        })
        .count();
    relevant as f64 / evidence.len() as f64
}

/// Share of the objective's content terms that appear in the draft.
fn term_coverage(objective: &str, text: &str) -> f64 {
    let terms = terms(objective);
    if terms.is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    terms.iter().filter(|t| lower.contains(t.as_str())).count() as f64 / terms.len() as f64
}

fn terms(s: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for w in s
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 3)
    {
        if !seen.contains(&w) {
            seen.push(w);
        }
    }
    seen
}
