//! Minimal OpenAI-compatible chat-completions and embeddings client

use crate::config::OpenAiConfig;
use crate::error::{LlmError, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const EMBED_BATCH: usize = 128;
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Text of the first choice
pub fn chat_content(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::response(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::response("no choices in chat response"))
}

/// Place each returned vector at `offset + index`; missing slots are an error
pub fn fill_embeddings(body: &str, offset: usize, out: &mut [Option<Vec<f32>>]) -> Result<()> {
    let response: EmbeddingResponse =
        serde_json::from_str(body).map_err(|e| LlmError::response(e.to_string()))?;
    for item in response.data {
        let Some(index) = item.index else {
            continue;
        };
        let slot = out
            .get_mut(offset + index)
            .ok_or_else(|| LlmError::response(format!("embedding index {index} out of range")))?;
        *slot = Some(item.embedding);
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn post(&self, path: &str, payload: &serde_json::Value) -> Result<String> {
        let url = self.config.endpoint(path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                url,
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        Ok(body)
    }

    /// One system + user exchange at temperature 0
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let payload = json!({
            "model": self.config.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let body = self.post("chat/completions", &payload).await?;
        chat_content(&body)
    }

    /// One vector per input, in input order
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for (batch, chunk) in texts.chunks(EMBED_BATCH).enumerate() {
            let payload = json!({
                "model": self.config.embed_model,
                "input": chunk,
            });
            let body = self.post("embeddings", &payload).await?;
            fill_embeddings(&body, batch * EMBED_BATCH, &mut out)?;
        }
        out.into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| LlmError::response("embedding response missing vectors"))
    }
}
