use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response: {0}")]
    Response(String),
}

impl LlmError {
    pub fn response(message: impl Into<String>) -> Self {
        Self::Response(message.into())
    }
}

impl From<LlmError> for tracesift_extract::ExtractError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Response(message) => Self::MalformedReply(message),
            other => Self::Transport(other.to_string()),
        }
    }
}
