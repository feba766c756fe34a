use crate::planner::{SECTION_ANALYSIS, SECTION_CONCLUSION, SECTION_INTRODUCTION};
use crate::types::{Claim, Draft, DraftSection, Evidence, Plan};

/// Renders outline sections from supported claims. Pure text assembly:
/// same plan and claims in, same draft out.
pub struct Drafter {
    max_citations_per_claim: usize,
}

impl Drafter {
    pub fn new(max_citations_per_claim: usize) -> Self {
        Self {
            max_citations_per_claim: max_citations_per_claim.max(1),
        }
    }

    pub fn draft(&self, plan: &Plan, claims: &[Claim]) -> Draft {
        let supported: Vec<&Claim> = claims.iter().filter(|c| c.is_supported()).collect();
        let excluded_claims: Vec<String> = claims
            .iter()
            .filter(|c| !c.is_supported())
            .map(|c| c.id.clone())
            .collect();

        let sections: Vec<DraftSection> = plan
            .outline
            .iter()
            .map(|outline| match outline.heading.as_str() {
                SECTION_INTRODUCTION => self.introduction(plan),
                SECTION_ANALYSIS => self.analysis(&supported),
                SECTION_CONCLUSION => self.conclusion(claims.len(), excluded_claims.len()),
                heading => self.claim_section(heading, &supported),
            })
            .collect();

        Draft {
            text: Draft::compose(&sections),
            sections,
            excluded_claims,
        }
    }

    fn cited<'a>(&self, claim: &'a Claim) -> &'a [Evidence] {
        let n = claim.evidence.len().min(self.max_citations_per_claim);
        &claim.evidence[..n]
    }

    fn introduction(&self, plan: &Plan) -> DraftSection {
        DraftSection {
            title: SECTION_INTRODUCTION.into(),
            content: format!(
                "Objective: {}\nTopic: {}\nJurisdiction: {}\nAudience: {}",
                plan.objective, plan.topic, plan.jurisdiction, plan.audience
            ),
            cited_evidence: Vec::new(),
        }
    }

    /// A section fed directly by claims whose `section` matches `heading`.
    fn claim_section(&self, heading: &str, supported: &[&Claim]) -> DraftSection {
        let mut content = String::new();
        let mut cited_evidence = Vec::new();
        for claim in supported.iter().filter(|c| c.section == heading) {
            if !content.is_empty() {
                content.push_str("\n\n");
            }
            content.push_str(&claim.assertion);
            for e in self.cited(claim) {
                content.push_str(&format!("\n- [{}] {}", e.id, citation_line(e)));
                if !e.text.is_empty() {
                    content.push_str(&format!(": {}", excerpt(&e.text, 280)));
                }
                cited_evidence.push(e.id.clone());
            }
        }
        DraftSection {
            title: heading.to_string(),
            content,
            cited_evidence,
        }
    }

    fn analysis(&self, supported: &[&Claim]) -> DraftSection {
        let mut content = String::new();
        let mut cited_evidence = Vec::new();
        for claim in supported {
            let ids: Vec<&str> = self.cited(claim).iter().map(|e| e.id.as_str()).collect();
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&format!("- {} (see {})", claim.assertion, bracketed(&ids)));
            cited_evidence.extend(ids.iter().map(|s| s.to_string()));
        }
        DraftSection {
            title: SECTION_ANALYSIS.into(),
            content,
            cited_evidence,
        }
    }

    fn conclusion(&self, total: usize, excluded: usize) -> DraftSection {
        let content = if total == 0 {
            "No verifiable points were identified for this objective.".to_string()
        } else if excluded == 0 {
            "Every point above is backed by the cited sources.".to_string()
        } else {
            format!(
                "{excluded} of {total} points could not be backed by verifiable sources and were left out of this draft."
            )
        };
        DraftSection {
            title: SECTION_CONCLUSION.into(),
            content,
            cited_evidence: Vec::new(),
        }
    }
}

/// "issuing body, citation (date)" with empty parts skipped.
pub fn citation_line(e: &Evidence) -> String {
    let mut s = e.issuing_body.clone();
    if !e.citation.is_empty() {
        s.push_str(", ");
        s.push_str(&e.citation);
    }
    if let Some(author) = e.author.as_deref().filter(|a| !a.is_empty()) {
        s.push_str(&format!(", {author}"));
    }
    if !e.date.is_empty() {
        s.push_str(&format!(" ({})", e.date));
    }
    s
}

fn bracketed(ids: &[&str]) -> String {
    ids.iter().map(|id| format!("[{id}]")).collect::<Vec<_>>().join(" ")
}

fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Planner, SECTION_NORMATIVE, SECTION_PRECEDENT};
    use crate::types::{EvidenceType, Request};

    fn evidence(n: usize) -> Evidence {
        Evidence {
            id: format!("C1-E{n}"),
            evidence_type: EvidenceType::Norm,
            issuing_body: "Federal Register".into(),
            date: "2024-03-01".into(),
            citation: format!("89 FR {n}"),
            author: None,
            text: "Rule text".into(),
            url: format!("https://www.federalregister.gov/d/{n}"),
            content_hash: None,
        }
    }

    fn plan() -> Plan {
        Planner::new("United States")
            .plan(&Request {
                objective: "explain filing requirements".into(),
                topic: "civil claim requirements".into(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn citations_are_capped_per_claim() {
        let plan = plan();
        let mut claims = plan.claims.clone();
        claims[0].resolve((1..=5).map(evidence).collect());
        claims[1].resolve(Vec::new());

        let draft = Drafter::new(3).draft(&plan, &claims);
        let normative = draft.sections.iter().find(|s| s.title == SECTION_NORMATIVE).unwrap();
        assert_eq!(normative.cited_evidence, vec!["C1-E1", "C1-E2", "C1-E3"]);
        assert!(!normative.content.contains("C1-E4"));
        assert_eq!(draft.excluded_claims, vec!["C2"]);
    }

    #[test]
    fn unsupported_claim_sections_are_empty() {
        let plan = plan();
        let mut claims = plan.claims.clone();
        for c in &mut claims {
            c.resolve(Vec::new());
        }
        let draft = Drafter::new(3).draft(&plan, &claims);
        for title in [SECTION_NORMATIVE, SECTION_PRECEDENT, SECTION_ANALYSIS] {
            let section = draft.sections.iter().find(|s| s.title == title).unwrap();
            assert!(section.content.is_empty(), "{title} should be empty");
            assert!(section.cited_evidence.is_empty());
        }
        assert!(draft.text.contains("2 of 2 points"));
    }

    #[test]
    fn drafting_is_deterministic() {
        let plan = plan();
        let mut claims = plan.claims.clone();
        claims[0].resolve(vec![evidence(1)]);
        claims[1].resolve(Vec::new());
        let a = Drafter::new(3).draft(&plan, &claims);
        let b = Drafter::new(3).draft(&plan, &claims);
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn citation_line_skips_empty_parts() {
        let mut e = evidence(1);
        e.citation.clear();
        e.date.clear();
        assert_eq!(citation_line(&e), "Federal Register");
    }
}
