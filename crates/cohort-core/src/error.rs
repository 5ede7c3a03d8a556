use thiserror::Error;

/// Top-level error type for the Cohort pipeline.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for CohortError` so that the `?` operator works
/// across crate boundaries. Only the variants here abort a run; failures of
/// individual summary calls are recorded as absent fields instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CohortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus unreadable at {path}: {reason}")]
    CorpusUnreadable { path: String, reason: String },

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CohortError {
    /// Build a `CorpusUnreadable` error for the given path.
    pub fn corpus(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        CohortError::CorpusUnreadable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<toml::de::Error> for CohortError {
    fn from(err: toml::de::Error) -> Self {
        CohortError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CohortError {
    fn from(err: toml::ser::Error) -> Self {
        CohortError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CohortError {
    fn from(err: serde_json::Error) -> Self {
        CohortError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Cohort operations.
pub type Result<T> = std::result::Result<T, CohortError>;
