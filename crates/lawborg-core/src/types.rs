use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Request ──────────────────────────────────────────────────────────────

/// A drafting request as submitted over HTTP. Immutable once the
/// pipeline starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub jurisdiction: String,
}

// ── Claims & Evidence ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceType {
    /// Statute, regulation or other normative text.
    Norm,
    /// Court decision.
    Ruling,
    /// General web result surfaced by the cascade.
    Web,
    /// Canned answer from the built-in knowledge base.
    KnowledgeBase,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Norm => "NORM",
            Self::Ruling => "RULING",
            Self::Web => "WEB",
            Self::KnowledgeBase => "KNOWLEDGE_BASE",
        }
    }
}

/// A retrieved record backing a claim. Owned by the claim that fetched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub evidence_type: EvidenceType,
    /// Provenance label set by the adapter that produced this record.
    pub issuing_body: String,
    pub date: String,
    pub citation: String,
    pub author: Option<String>,
    pub text: String,
    pub url: String,
    /// sha256 over `url|date`, filled in by the finalizer.
    #[serde(default)]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSource {
    pub source_type: EvidenceType,
    pub query: String,
    /// Adapter id to try first (e.g. "official_registry"). Unknown ids fall
    /// back to the cascading search.
    pub preferred_provider: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Pending,
    Supported,
    Unsupported,
}

pub const RISK_CONFIDENTIALITY: &str = "confidentiality";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub assertion: String,
    pub jurisdiction: String,
    /// Outline heading this claim feeds.
    pub section: String,
    pub required_sources: Vec<RequiredSource>,
    pub status: ClaimStatus,
    pub risk_tags: Vec<String>,
    pub evidence: Vec<Evidence>,
}

impl Claim {
    /// Settle a pending claim. Non-empty evidence makes it SUPPORTED, empty
    /// makes it UNSUPPORTED. Returns false (and leaves the claim untouched)
    /// if the claim was already settled.
    pub fn resolve(&mut self, evidence: Vec<Evidence>) -> bool {
        if self.status != ClaimStatus::Pending {
            return false;
        }
        self.status = if evidence.is_empty() {
            ClaimStatus::Unsupported
        } else {
            ClaimStatus::Supported
        };
        self.evidence = evidence;
        true
    }

    pub fn is_supported(&self) -> bool {
        self.status == ClaimStatus::Supported
    }

    pub fn has_risk(&self, tag: &str) -> bool {
        self.risk_tags.iter().any(|t| t == tag)
    }
}

// ── Plan ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    pub subheadings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub objective: String,
    pub topic: String,
    pub audience: String,
    pub jurisdiction: String,
    pub outline: Vec<OutlineSection>,
    pub claims: Vec<Claim>,
    pub style_rules: Vec<String>,
    pub risk_checks: Vec<String>,
}

// ── Retrieval ────────────────────────────────────────────────────────────

/// One adapter call made on behalf of a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub provider: String,
    pub query: String,
    pub evidence_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverResult {
    pub claim_id: String,
    pub status: ClaimStatus,
    pub evidence_count: usize,
    pub attempts: Vec<SourceAttempt>,
    /// The run was cancelled before this claim finished retrieving.
    pub cancelled: bool,
}

// ── Draft ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSection {
    pub title: String,
    pub content: String,
    pub cited_evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    pub sections: Vec<DraftSection>,
    pub excluded_claims: Vec<String>,
}

impl Draft {
    /// Assemble the full text from the section list.
    pub fn compose(sections: &[DraftSection]) -> String {
        let mut s = String::new();
        for section in sections {
            if !s.is_empty() {
                s.push_str("\n\n");
            }
            s.push_str(&format!("## {}\n", section.title));
            if !section.content.is_empty() {
                s.push('\n');
                s.push_str(&section.content);
            }
        }
        s
    }

    /// Evidence ids cited anywhere in the draft, first-citation order, no
    /// duplicates.
    pub fn cited_evidence(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self.sections.iter().flat_map(|s| s.cited_evidence.iter()) {
            if !out.contains(&id.as_str()) {
                out.push(id);
            }
        }
        out
    }
}

// ── Verification ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailResult {
    pub rule: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub faithfulness: f64,
    pub context_relevance: f64,
    pub answer_relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub guardrails: Vec<GuardrailResult>,
    pub metrics: QualityMetrics,
    pub approved: bool,
    pub observations: Vec<String>,
}

impl VerificationReport {
    /// Build a report whose verdict is the AND of every guardrail.
    pub fn new(guardrails: Vec<GuardrailResult>, metrics: QualityMetrics) -> Self {
        let approved = guardrails.iter().all(|g| g.passed);
        let observations = guardrails
            .iter()
            .filter(|g| !g.passed)
            .map(|g| format!("{}: {}", g.rule, g.detail))
            .collect();
        Self {
            guardrails,
            metrics,
            approved,
            observations,
        }
    }
}

// ── Finalization ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceHash {
    pub evidence_id: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceabilityRecord {
    pub pipeline_version: String,
    pub prompt_version: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub evidence_hashes: Vec<EvidenceHash>,
    pub metrics: QualityMetrics,
    pub log: Vec<String>,
    pub compliance: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Completeness {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalOutput {
    #[serde(rename = "trazabilidad")]
    pub traceability: TraceabilityRecord,
    pub status: Completeness,
    pub missing_claims: Vec<String>,
    pub text_final: String,
    /// Guardrails did not all pass; a human must look before release.
    pub requires_review: bool,
}

/// Everything one pipeline run produces, returned by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub plan: Plan,
    /// Claims after retrieval, each settled with its evidence.
    pub claims: Vec<Claim>,
    pub retriever_results: Vec<RetrieverResult>,
    pub draft: Draft,
    pub verification: VerificationReport,
    pub final_output: FinalOutput,
}

// ── Pipeline Events ──────────────────────────────────────────────────────

/// Broadcast after each stage of a run completes.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Stage { run_id: String, stage: &'static str, message: String },
    Finished { run_id: String, approved: bool, complete: bool },
}

impl PipelineEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Stage { .. } => "stage",
            Self::Finished { .. } => "finished",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::Stage { run_id, .. } | Self::Finished { run_id, .. } => run_id,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Stage { stage, message, .. } => format!("[{stage}] {message}"),
            Self::Finished { approved, complete, .. } => {
                format!("run finished (approved={approved}, complete={complete})")
            }
        }
    }
}
