//! Source search for the drafting pipeline: query classification, the
//! tiered cascade over web providers, and the structured legal adapters.

pub mod adapter;
pub mod cascade;
pub mod classifier;
pub mod legal;
pub mod providers;
pub mod scoring;

pub use adapter::CascadeAdapter;
pub use cascade::{CascadeOutcome, CascadeSearch, CascadeSettings, TierProviders};
pub use classifier::{Classification, QueryClassifier, Strategy};
pub use scoring::ScoringPolicy;
