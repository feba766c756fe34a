use thiserror::Error;

/// The one condition that aborts a run before planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request objective is missing or blank")]
    MissingObjective,
    #[error("request field `{field}` exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}
