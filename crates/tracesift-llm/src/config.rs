//! Endpoint settings for OpenAI-compatible services

use crate::error::{LlmError, Result};
use std::env;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Credentials, endpoint and model names
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            timeout_secs: 120,
        }
    }

    /// Read `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`, `OPENAI_MODEL`
    /// and `OPENAI_EMBED_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = non_empty_var("OPENAI_API_KEY").ok_or(LlmError::MissingApiKey)?;
        let mut config = Self::new(api_key);
        if let Some(base_url) = non_empty_var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = non_empty_var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Some(embed_model) = non_empty_var("OPENAI_EMBED_MODEL") {
            config.embed_model = embed_model;
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
