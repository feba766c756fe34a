pub mod agent;
pub mod config;
pub mod drafter;
pub mod error;
pub mod finalizer;
pub mod pipeline;
pub mod planner;
pub mod prompt;
pub mod refine;
pub mod retriever;
pub mod source;
pub mod types;
pub mod verifier;

pub use types::*;
