use cohort_core::error::CohortError;
use thiserror::Error;

/// Errors that can occur while partitioning.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("config error: {0}")]
    Config(String),
}

impl From<InsightError> for CohortError {
    fn from(err: InsightError) -> Self {
        match err {
            InsightError::Config(msg) => CohortError::Config(msg),
            other => CohortError::Clustering(other.to_string()),
        }
    }
}

/// Failure of a single generative-text call.
///
/// Only `RateLimited` is retried; anything else leaves the summary field
/// absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("generation failed: {0}")]
    Other(String),
}
