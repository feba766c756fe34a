use async_trait::async_trait;

use crate::types::Evidence;

/// A structured legal source (registry, case-law repository, ...) behind a
/// uniform lookup.
///
/// Implementations apply their own timeout and never fail past this
/// boundary: network errors, timeouts and malformed responses all come back
/// as an empty list. Evidence ids are assigned by the retriever, so adapters
/// may leave them blank.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable id matched against `RequiredSource::preferred_provider`.
    fn id(&self) -> &str;

    async fn search(&self, query: &str) -> Vec<Evidence>;
}
