use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors raised while extracting candidates from a chunk
///
/// None of these abort a run: the miner logs them and treats the chunk as
/// having produced zero candidates.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Oracle request failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Oracle did not answer in time
    #[error("extraction of {chunk_id} timed out after {secs}s")]
    Timeout { chunk_id: String, secs: u64 },

    /// Oracle answered with something other than `{"items": [...]}`
    #[error("malformed oracle reply: {0}")]
    MalformedReply(String),

    /// Worker task panicked or was cancelled
    #[error("worker join failed: {0}")]
    Join(String),

    /// Session discovery or reading failed
    #[error(transparent)]
    Log(#[from] tracesift_log::LogError),
}

impl ExtractError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReply(message.into())
    }
}
