use tracing::debug;

use crate::error::RequestError;
use crate::types::{
    Claim, ClaimStatus, EvidenceType, OutlineSection, Plan, Request, RequiredSource,
    RISK_CONFIDENTIALITY,
};

pub const SECTION_INTRODUCTION: &str = "Introduction";
pub const SECTION_NORMATIVE: &str = "Normative framework";
pub const SECTION_PRECEDENT: &str = "Applicable precedent";
pub const SECTION_ANALYSIS: &str = "Analysis";
pub const SECTION_CONCLUSION: &str = "Conclusion";

pub const PROVIDER_OFFICIAL_REGISTRY: &str = "official_registry";
pub const PROVIDER_JURISPRUDENCE: &str = "jurisprudence";

const DEFAULT_AUDIENCE: &str = "general public";
const MAX_FIELD_CHARS: usize = 2000;

/// Deterministic request -> plan expansion. No I/O.
pub struct Planner {
    default_jurisdiction: String,
}

impl Planner {
    pub fn new(default_jurisdiction: impl Into<String>) -> Self {
        Self {
            default_jurisdiction: default_jurisdiction.into(),
        }
    }

    pub fn plan(&self, request: &Request) -> Result<Plan, RequestError> {
        let objective = request.objective.trim();
        if objective.is_empty() {
            return Err(RequestError::MissingObjective);
        }
        for (field, value) in [
            ("objective", &request.objective),
            ("topic", &request.topic),
            ("audience", &request.audience),
            ("jurisdiction", &request.jurisdiction),
        ] {
            if value.chars().count() > MAX_FIELD_CHARS {
                return Err(RequestError::FieldTooLong { field, max: MAX_FIELD_CHARS });
            }
        }

        let topic = non_blank(&request.topic).unwrap_or(objective).to_string();
        let audience = non_blank(&request.audience).unwrap_or(DEFAULT_AUDIENCE).to_string();
        let jurisdiction = non_blank(&request.jurisdiction)
            .unwrap_or(&self.default_jurisdiction)
            .to_string();

        let claims = vec![
            Claim {
                id: "C1".into(),
                assertion: format!(
                    "The normative framework governing {topic} in {jurisdiction} sets out the applicable requirements."
                ),
                jurisdiction: jurisdiction.clone(),
                section: SECTION_NORMATIVE.into(),
                required_sources: vec![RequiredSource {
                    source_type: EvidenceType::Norm,
                    query: format!("{topic} {jurisdiction}"),
                    preferred_provider: PROVIDER_OFFICIAL_REGISTRY.into(),
                }],
                status: ClaimStatus::Pending,
                risk_tags: vec![RISK_CONFIDENTIALITY.into()],
                evidence: Vec::new(),
            },
            Claim {
                id: "C2".into(),
                assertion: format!(
                    "Courts in {jurisdiction} have applied these rules to {topic}."
                ),
                jurisdiction: jurisdiction.clone(),
                section: SECTION_PRECEDENT.into(),
                required_sources: vec![RequiredSource {
                    source_type: EvidenceType::Ruling,
                    query: topic.clone(),
                    preferred_provider: PROVIDER_JURISPRUDENCE.into(),
                }],
                status: ClaimStatus::Pending,
                risk_tags: vec![RISK_CONFIDENTIALITY.into()],
                evidence: Vec::new(),
            },
        ];

        let outline = vec![
            OutlineSection {
                heading: SECTION_INTRODUCTION.into(),
                subheadings: vec!["Objective".into(), "Scope".into()],
            },
            OutlineSection {
                heading: SECTION_NORMATIVE.into(),
                subheadings: vec![format!("Rules on {topic}")],
            },
            OutlineSection {
                heading: SECTION_PRECEDENT.into(),
                subheadings: vec![format!("Decisions on {topic}")],
            },
            OutlineSection {
                heading: SECTION_ANALYSIS.into(),
                subheadings: vec!["Application to the objective".into()],
            },
            OutlineSection {
                heading: SECTION_CONCLUSION.into(),
                subheadings: Vec::new(),
            },
        ];

        debug!(topic = %topic, jurisdiction = %jurisdiction, claims = claims.len(), "plan built");

        Ok(Plan {
            objective: objective.to_string(),
            topic,
            audience,
            jurisdiction,
            outline,
            claims,
            style_rules: vec![
                "Plain, modern register; no archaic formulas.".into(),
                "Every factual statement cites its evidence id.".into(),
                "No personal identification numbers.".into(),
            ],
            risk_checks: vec![
                RISK_CONFIDENTIALITY.into(),
                "evidence_support_ratio".into(),
                "register".into(),
            ],
        })
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request {
            objective: "explain filing requirements".into(),
            topic: "civil claim requirements".into(),
            audience: String::new(),
            jurisdiction: "X".into(),
        }
    }

    #[test]
    fn blank_objective_is_rejected() {
        let planner = Planner::new("United States");
        let req = Request { objective: "   ".into(), ..request() };
        assert_eq!(planner.plan(&req).unwrap_err(), RequestError::MissingObjective);
    }

    #[test]
    fn outline_has_fixed_shape() {
        let plan = Planner::new("United States").plan(&request()).unwrap();
        let headings: Vec<&str> = plan.outline.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            &[
                SECTION_INTRODUCTION,
                SECTION_NORMATIVE,
                SECTION_PRECEDENT,
                SECTION_ANALYSIS,
                SECTION_CONCLUSION
            ]
        );
    }

    #[test]
    fn claims_request_norm_and_ruling_sources() {
        let plan = Planner::new("United States").plan(&request()).unwrap();
        assert_eq!(plan.claims.len(), 2);
        let kinds: Vec<EvidenceType> = plan
            .claims
            .iter()
            .flat_map(|c| c.required_sources.iter().map(|r| r.source_type))
            .collect();
        assert!(kinds.contains(&EvidenceType::Norm));
        assert!(kinds.contains(&EvidenceType::Ruling));
        assert!(plan.claims.iter().all(|c| c.status == ClaimStatus::Pending));
        assert!(plan.claims.iter().all(|c| c.has_risk(RISK_CONFIDENTIALITY)));
        assert!(plan.claims[0].required_sources[0].query.contains("civil claim requirements"));
    }

    #[test]
    fn blanks_fall_back_to_defaults() {
        let req = Request {
            objective: "draft a demand letter".into(),
            topic: String::new(),
            audience: String::new(),
            jurisdiction: String::new(),
        };
        let plan = Planner::new("United States").plan(&req).unwrap();
        assert_eq!(plan.topic, "draft a demand letter");
        assert_eq!(plan.jurisdiction, "United States");
        assert_eq!(plan.audience, DEFAULT_AUDIENCE);
    }

    #[test]
    fn oversized_field_is_rejected() {
        let req = Request { topic: "t".repeat(MAX_FIELD_CHARS + 1), ..request() };
        assert!(matches!(
            Planner::new("US").plan(&req),
            Err(RequestError::FieldTooLong { field: "topic", .. })
        ));
    }
}
