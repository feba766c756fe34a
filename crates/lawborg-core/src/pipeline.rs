use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

pub use crate::types::PipelineEvent;

use crate::{
    config::Config,
    drafter::Drafter,
    error::RequestError,
    finalizer::{stamp_hashes, Finalizer, RunInfo},
    planner::Planner,
    refine::Refiner,
    retriever::Retriever,
    types::{ClaimStatus, Completeness, PipelineOutput, Request},
    verifier::Verifier,
};

const TEMPLATE_MODEL: &str = "deterministic-template";

/// Plan -> Retrieve -> Draft -> (Refine) -> Verify -> Finalize.
pub struct DraftingPipeline {
    planner: Planner,
    retriever: Retriever,
    drafter: Drafter,
    verifier: Verifier,
    refiner: Option<Refiner>,
    pipeline_version: String,
    prompt_version: String,
    /// Cancels retrieval when exceeded; `None` = no deadline.
    deadline: Option<Duration>,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    run_seq: AtomicU64,
}

impl DraftingPipeline {
    pub fn new(
        config: &Config,
        retriever: Retriever,
        refiner: Option<Refiner>,
    ) -> (Self, broadcast::Receiver<PipelineEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let p = Self {
            planner: Planner::new(config.default_jurisdiction.clone()),
            retriever,
            drafter: Drafter::new(config.max_citations_per_claim),
            verifier: Verifier::new(config.support_threshold),
            refiner,
            pipeline_version: config.pipeline_version.clone(),
            prompt_version: config.prompt_version.clone(),
            deadline: (config.pipeline_timeout_s > 0)
                .then(|| Duration::from_secs(config.pipeline_timeout_s)),
            event_tx: tx,
            run_seq: AtomicU64::new(0),
        };
        (p, rx)
    }

    fn emit(&self, run_id: &str, stage: &'static str, message: String, log: &mut Vec<String>) {
        log.push(format!("{stage}: {message}"));
        let _ = self.event_tx.send(PipelineEvent::Stage {
            run_id: run_id.to_string(),
            stage,
            message,
        });
    }

    /// Run one request end to end.
    ///
    /// Only a malformed request is an error; provider failures, unsupported
    /// claims and failed guardrails all come back as data in the output.
    /// Cancelling `cancel` aborts in-flight retrieval; the run still
    /// completes with whatever claims had already settled.
    pub async fn run(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, RequestError> {
        let run_id = format!(
            "run-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            self.run_seq.fetch_add(1, Ordering::Relaxed)
        );
        let span = info_span!("pipeline_run", run_id = %run_id);
        self.run_inner(&run_id, request, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: &str,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, RequestError> {
        let mut log = Vec::new();

        let plan = match self.planner.plan(request) {
            Ok(p) => p,
            Err(e) => {
                warn!("request rejected: {e}");
                return Err(e);
            }
        };
        self.emit(
            run_id,
            "plan",
            format!("{} sections, {} claims", plan.outline.len(), plan.claims.len()),
            &mut log,
        );

        let run_cancel = cancel.child_token();
        let retrieval = self.retriever.retrieve(plan.claims.clone(), &run_cancel);
        tokio::pin!(retrieval);
        let (mut claims, retriever_results) = match self.deadline {
            Some(limit) => tokio::select! {
                r = &mut retrieval => r,
                _ = tokio::time::sleep(limit) => {
                    warn!(limit_s = limit.as_secs(), "retrieval deadline reached, cancelling");
                    run_cancel.cancel();
                    retrieval.await
                }
            },
            None => retrieval.await,
        };
        let supported = claims.iter().filter(|c| c.status == ClaimStatus::Supported).count();
        let cancelled = retriever_results.iter().filter(|r| r.cancelled).count();
        self.emit(
            run_id,
            "retrieve",
            format!("{supported}/{} claims supported, {cancelled} cancelled", claims.len()),
            &mut log,
        );
        stamp_hashes(&mut claims);

        let mut draft = self.drafter.draft(&plan, &claims);
        self.emit(
            run_id,
            "draft",
            format!(
                "{} sections, {} claims excluded",
                draft.sections.len(),
                draft.excluded_claims.len()
            ),
            &mut log,
        );

        let model = match &self.refiner {
            Some(refiner) if !run_cancel.is_cancelled() => {
                let (refined, notes) = refiner.refine(&plan, &claims, &draft).await;
                draft = refined;
                for note in notes {
                    self.emit(run_id, "refine", note, &mut log);
                }
                refiner.model_id()
            }
            _ => TEMPLATE_MODEL.to_string(),
        };

        let verification = self.verifier.verify(&plan, &draft, &claims);
        self.emit(
            run_id,
            "verify",
            if verification.approved {
                "approved".to_string()
            } else {
                format!("requires review: {}", verification.observations.join("; "))
            },
            &mut log,
        );

        let finalizer = Finalizer::new(RunInfo {
            pipeline_version: self.pipeline_version.clone(),
            prompt_version: self.prompt_version.clone(),
            model,
        });
        let final_output = finalizer.finalize(&claims, &draft, &verification, log);
        let complete = final_output.status == Completeness::Complete;
        info!(approved = verification.approved, complete, "run finished");
        let _ = self.event_tx.send(PipelineEvent::Finished {
            run_id: run_id.to_string(),
            approved: verification.approved,
            complete,
        });

        Ok(PipelineOutput {
            plan,
            claims,
            retriever_results,
            draft,
            verification,
            final_output,
        })
    }
}
