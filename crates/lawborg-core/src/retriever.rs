use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::source::SourceAdapter;
use crate::types::{Claim, Evidence, RequiredSource, RetrieverResult, SourceAttempt};

/// Fans claims out to source adapters and settles each claim's status.
pub struct Retriever {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    /// Used when no adapter matches a RequiredSource's preferred provider.
    fallback: Arc<dyn SourceAdapter>,
    fanout: usize,
}

struct ClaimRetrieval {
    evidence: Vec<Evidence>,
    attempts: Vec<SourceAttempt>,
}

impl Retriever {
    pub fn new(fallback: Arc<dyn SourceAdapter>, fanout: usize) -> Self {
        Self {
            adapters: HashMap::new(),
            fallback,
            fanout: fanout.max(1),
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.id().to_string(), adapter);
        self
    }

    fn adapter_for(&self, source: &RequiredSource) -> &Arc<dyn SourceAdapter> {
        self.adapters
            .get(&source.preferred_provider)
            .unwrap_or(&self.fallback)
    }

    /// Retrieve evidence for every pending claim.
    ///
    /// Claims still in flight when `cancel` fires, and claims not yet
    /// started, settle as UNSUPPORTED; claims already retrieved keep their
    /// result. Output order matches input order.
    pub async fn retrieve(
        &self,
        mut claims: Vec<Claim>,
        cancel: &CancellationToken,
    ) -> (Vec<Claim>, Vec<RetrieverResult>) {
        // Each future owns its claim so the run future stays `Send` for
        // any caller lifetime.
        let work: Vec<_> = claims
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, claim)| {
                let cancel = cancel.clone();
                async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => (idx, None),
                        r = self.retrieve_claim(&claim) => (idx, Some(r)),
                    }
                }
            })
            .collect();
        let finished: Vec<(usize, Option<ClaimRetrieval>)> = stream::iter(work)
            .buffer_unordered(self.fanout)
            .collect()
            .await;

        let mut slots: Vec<Option<ClaimRetrieval>> = Vec::with_capacity(claims.len());
        slots.resize_with(claims.len(), || None);
        let mut cancelled = vec![false; claims.len()];
        for (idx, outcome) in finished {
            match outcome {
                Some(r) => slots[idx] = Some(r),
                None => cancelled[idx] = true,
            }
        }

        let mut results = Vec::with_capacity(claims.len());
        for ((claim, slot), was_cancelled) in claims.iter_mut().zip(slots).zip(cancelled) {
            let ClaimRetrieval { evidence, attempts } = slot.unwrap_or(ClaimRetrieval {
                evidence: Vec::new(),
                attempts: Vec::new(),
            });
            if !claim.resolve(evidence) {
                warn!(claim = %claim.id, "claim already settled, retrieval result ignored");
            }
            info!(
                claim = %claim.id,
                status = ?claim.status,
                evidence = claim.evidence.len(),
                cancelled = was_cancelled,
                "claim retrieval settled"
            );
            results.push(RetrieverResult {
                claim_id: claim.id.clone(),
                status: claim.status,
                evidence_count: claim.evidence.len(),
                attempts,
                cancelled: was_cancelled,
            });
        }
        (claims, results)
    }

    async fn retrieve_claim(&self, claim: &Claim) -> ClaimRetrieval {
        let calls: Vec<_> = claim
            .required_sources
            .iter()
            .map(|source| {
                let adapter = Arc::clone(self.adapter_for(source));
                let claim_id = claim.id.clone();
                let query = source.query.clone();
                async move {
                    debug!(claim = %claim_id, provider = adapter.id(), query = %query, "querying source");
                    let found = adapter.search(&query).await;
                    (adapter.id().to_string(), query, found)
                }
            })
            .collect();

        let mut evidence = Vec::new();
        let mut attempts = Vec::new();
        for (provider, query, found) in join_all(calls).await {
            attempts.push(SourceAttempt {
                provider,
                query,
                evidence_count: found.len(),
            });
            evidence.extend(found);
        }
        for (n, e) in evidence.iter_mut().enumerate() {
            e.id = format!("{}-E{}", claim.id, n + 1);
        }
        ClaimRetrieval { evidence, attempts }
    }
}
