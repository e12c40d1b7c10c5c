//! Error types for EXPLAIN analysis

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when ingesting or analyzing EXPLAIN output
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Plan node not found in EXPLAIN output")]
    MissingPlan,

    #[error("Plan exceeds the {what} limit of {limit}")]
    LimitExceeded { what: &'static str, limit: usize },
}

/// Result type alias for EXPLAIN analysis
pub type Result<T> = std::result::Result<T, ExplainError>;

/// User-facing failure shape.
///
/// Malformed input is a normal condition here (users paste arbitrary text),
/// so ingestion failures are carried as data rather than propagated as
/// errors past the public entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub detail: String,
}

impl From<&ExplainError> for Diagnostic {
    fn from(err: &ExplainError) -> Self {
        match err {
            ExplainError::InvalidJson(source) => Diagnostic {
                message: "Failed to parse JSON".to_string(),
                detail: format!("{source}\nPaste valid JSON from EXPLAIN (FORMAT JSON)."),
            },
            ExplainError::MissingPlan => Diagnostic {
                message: "Invalid EXPLAIN JSON: Plan node not found.".to_string(),
                detail: "Provide output from EXPLAIN (FORMAT JSON) or EXPLAIN (ANALYZE, FORMAT \
                         JSON). The root should be an array and its first element must contain a \
                         \"Plan\" object."
                    .to_string(),
            },
            ExplainError::LimitExceeded { .. } => Diagnostic {
                message: "Plan is too large to analyze.".to_string(),
                detail: err.to_string(),
            },
        }
    }
}
