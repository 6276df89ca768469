use thiserror::Error;

/// Result type for log reading operations
pub type Result<T> = std::result::Result<T, LogError>;

/// Errors raised while locating or reading session logs
#[derive(Error, Debug)]
pub enum LogError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sessions directory does not exist
    #[error("sessions dir not found: {0}")]
    SessionsDirNotFound(String),

    /// Include/exclude glob failed to compile
    #[error("invalid glob `{pattern}`: {message}")]
    InvalidGlob { pattern: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LogError {
    pub fn invalid_glob(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidGlob {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
