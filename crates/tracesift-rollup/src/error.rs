use thiserror::Error;

/// Result type for rollup and merge operations
pub type Result<T> = std::result::Result<T, RollupError>;

/// Errors raised by merge collaborators
///
/// Inside the merger every one of these means "do not merge"; they never
/// abort a rollup.
#[derive(Error, Debug)]
pub enum RollupError {
    /// Embedding service failed
    #[error("embedder error: {0}")]
    Embedder(String),

    /// Embedding service returned the wrong number of vectors
    #[error("expected {expected} embeddings, got {actual}")]
    VectorCount { expected: usize, actual: usize },

    /// Embedding vectors disagree on dimension
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// Merge judge failed or replied with garbage
    #[error("merge judge error: {0}")]
    Judge(String),

    /// Merge judge did not answer in time
    #[error("merge judge timed out after {0}s")]
    Timeout(u64),
}

impl RollupError {
    pub fn embedder(message: impl Into<String>) -> Self {
        Self::Embedder(message.into())
    }

    pub fn judge(message: impl Into<String>) -> Self {
        Self::Judge(message.into())
    }
}
