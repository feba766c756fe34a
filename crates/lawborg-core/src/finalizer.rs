use std::collections::BTreeMap;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::drafter::citation_line;
use crate::types::{
    Claim, Completeness, Draft, Evidence, EvidenceHash, FinalOutput, TraceabilityRecord,
    VerificationReport, RISK_CONFIDENTIALITY,
};

/// Versions and model id stamped into every traceability record.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub pipeline_version: String,
    pub prompt_version: String,
    pub model: String,
}

pub struct Finalizer {
    info: RunInfo,
}

/// sha256 over `url|date`, lower-case hex.
pub fn evidence_hash(e: &Evidence) -> String {
    let mut h = Sha256::new();
    h.update(e.url.as_bytes());
    h.update(b"|");
    h.update(e.date.as_bytes());
    hex::encode(h.finalize())
}

/// Fill each evidence record's derived content hash.
pub fn stamp_hashes(claims: &mut [Claim]) {
    for e in claims.iter_mut().flat_map(|c| c.evidence.iter_mut()) {
        e.content_hash = Some(evidence_hash(e));
    }
}

impl Finalizer {
    pub fn new(info: RunInfo) -> Self {
        Self { info }
    }

    pub fn finalize(
        &self,
        claims: &[Claim],
        draft: &Draft,
        report: &VerificationReport,
        log: Vec<String>,
    ) -> FinalOutput {
        let evidence_hashes: Vec<EvidenceHash> = claims
            .iter()
            .flat_map(|c| c.evidence.iter())
            .map(|e| EvidenceHash {
                evidence_id: e.id.clone(),
                hash: e.content_hash.clone().unwrap_or_else(|| evidence_hash(e)),
            })
            .collect();

        let blocking = claims
            .iter()
            .any(|c| c.has_risk(RISK_CONFIDENTIALITY) && !c.is_supported());
        let (status, missing_claims) = if blocking {
            let missing = claims
                .iter()
                .filter(|c| !c.is_supported())
                .map(|c| format!("{} ({}): {}", c.id, c.section, c.assertion))
                .collect();
            (Completeness::Incomplete, missing)
        } else {
            (Completeness::Complete, Vec::new())
        };

        let cited = cited_evidence(claims, draft);
        let mut compliance = BTreeMap::new();
        for g in &report.guardrails {
            compliance.insert(g.rule.clone(), g.passed);
        }
        compliance.insert(
            "citations_traceable".to_string(),
            cited.iter().all(|e| !e.url.is_empty()),
        );
        compliance.insert("human_review_required".to_string(), !report.approved);

        FinalOutput {
            traceability: TraceabilityRecord {
                pipeline_version: self.info.pipeline_version.clone(),
                prompt_version: self.info.prompt_version.clone(),
                model: self.info.model.clone(),
                timestamp: Utc::now(),
                evidence_hashes,
                metrics: report.metrics,
                log,
                compliance,
            },
            status,
            missing_claims,
            text_final: with_citations(&draft.text, &cited),
            requires_review: !report.approved,
        }
    }
}

/// Evidence cited by the draft, in first-citation order.
fn cited_evidence<'a>(claims: &'a [Claim], draft: &Draft) -> Vec<&'a Evidence> {
    draft
        .cited_evidence()
        .into_iter()
        .filter_map(|id| claims.iter().flat_map(|c| c.evidence.iter()).find(|e| e.id == id))
        .collect()
}

fn with_citations(text: &str, cited: &[&Evidence]) -> String {
    if cited.is_empty() {
        return text.to_string();
    }
    let mut s = format!("{text}\n\n## Sources\n");
    for (n, e) in cited.iter().enumerate() {
        s.push_str(&format!("\n{}. [{}] {}", n + 1, e.id, citation_line(e)));
        if !e.url.is_empty() {
            s.push_str(&format!(" <{}>", e.url));
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EvidenceType;

    fn evidence(url: &str, date: &str) -> Evidence {
        Evidence {
            id: "C1-E1".into(),
            evidence_type: EvidenceType::Ruling,
            issuing_body: "CourtListener".into(),
            date: date.into(),
            citation: "410 U.S. 113".into(),
            author: Some("Blackmun".into()),
            text: String::new(),
            url: url.into(),
            content_hash: None,
        }
    }

    #[test]
    fn hash_depends_on_url_and_date() {
        let a = evidence_hash(&evidence("https://a", "2020-01-01"));
        let b = evidence_hash(&evidence("https://a", "2020-01-02"));
        let c = evidence_hash(&evidence("https://b", "2020-01-01"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, evidence_hash(&evidence("https://a", "2020-01-01")));
    }

    #[test]
    fn citation_list_is_numbered() {
        let e = evidence("https://www.courtlistener.com/opinion/1/", "1973-01-22");
        let text = with_citations("body", &[&e]);
        assert!(text.starts_with("body\n\n## Sources\n"));
        assert!(text.contains("1. [C1-E1] CourtListener, 410 U.S. 113, Blackmun (1973-01-22) <https://www.courtlistener.com/opinion/1/>"));
    }

    #[test]
    fn no_citations_leaves_text_untouched() {
        assert_eq!(with_citations("body", &[]), "body");
    }
}
