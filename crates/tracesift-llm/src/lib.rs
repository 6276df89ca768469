//! OpenAI-compatible oracle adapters for extraction, merge judging and embeddings

mod client;
mod config;
mod error;
mod oracle;

pub use client::{chat_content, fill_embeddings, OpenAiClient};
pub use config::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL, DEFAULT_MODEL};
pub use error::{LlmError, Result};
pub use oracle::{
    build_judge_prompt, parse_decision, OracleEmbedder, OracleExtractor, OracleJudge,
};
