//! Oracle-backed adapters for extraction, merge judging and embeddings

use crate::client::OpenAiClient;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracesift_core::{Chunk, Constraints};
use tracesift_extract::{build_prompt, parse_reply, Candidate, Extractor};
use tracesift_rollup::{Embedder, JudgeView, MergeDecision, MergeJudge, RollupError};

/// Extractor that sends each chunk to a chat-completions endpoint
pub struct OracleExtractor {
    client: OpenAiClient,
}

impl OracleExtractor {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Extractor for OracleExtractor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(
        &self,
        chunk: &Chunk,
        constraints: &Constraints,
    ) -> tracesift_extract::Result<Vec<Candidate>> {
        let prompt = build_prompt(chunk, constraints);
        let reply = self.client.complete(&prompt.system, &prompt.user).await?;
        let candidates = parse_reply(&reply)?;
        tracing::debug!(chunk = %chunk.chunk_id, candidates = candidates.len(), "oracle reply");
        Ok(candidates)
    }
}

const JUDGE_SYSTEM_PROMPT: &str = "You compare two clusters of issues mined from AI-agent session logs. \
Decide whether they describe the same underlying issue. \
Return ONLY strict JSON: {\"merge\": true|false, \"confidence\": 0.0-1.0, \"reason\": \"short reason\"}.";

/// User payload showing both rollups to the judge
pub fn build_judge_prompt(a: &JudgeView, b: &JudgeView) -> String {
    let payload = json!({ "a": a, "b": b });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Parse the first `{...}` span of a judge reply
///
/// `merge` must be a boolean; a missing or non-numeric confidence reads as 0.
pub fn parse_decision(text: &str) -> tracesift_rollup::Result<MergeDecision> {
    let span = json_object_re()
        .find(text)
        .ok_or_else(|| RollupError::judge("no JSON object in reply"))?;
    let value: Value =
        serde_json::from_str(span.as_str()).map_err(|e| RollupError::judge(e.to_string()))?;
    let merge = value
        .get("merge")
        .and_then(Value::as_bool)
        .ok_or_else(|| RollupError::judge("reply has no boolean `merge`"))?;
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(MergeDecision {
        merge,
        confidence,
        reason,
    })
}

/// Merge judge backed by a chat-completions endpoint
pub struct OracleJudge {
    client: OpenAiClient,
}

impl OracleJudge {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MergeJudge for OracleJudge {
    async fn judge(&self, a: &JudgeView, b: &JudgeView) -> tracesift_rollup::Result<MergeDecision> {
        let reply = self
            .client
            .complete(JUDGE_SYSTEM_PROMPT, &build_judge_prompt(a, b))
            .await
            .map_err(|e| RollupError::judge(e.to_string()))?;
        parse_decision(&reply)
    }
}

/// Embedder backed by an embeddings endpoint
pub struct OracleEmbedder {
    client: OpenAiClient,
}

impl OracleEmbedder {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Embedder for OracleEmbedder {
    async fn embed(&self, texts: &[String]) -> tracesift_rollup::Result<Vec<Vec<f32>>> {
        let vectors = self
            .client
            .embed(texts)
            .await
            .map_err(|e| RollupError::embedder(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(RollupError::VectorCount {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn view(summary: &str) -> JudgeView {
        JudgeView {
            canonical_summary: summary.to_string(),
            kind_v2_counts: BTreeMap::from([("reliability_perf".to_string(), 2)]),
            tags_top: vec!["network".to_string()],
        }
    }

    #[test]
    fn test_judge_prompt_carries_both_views() {
        let prompt = build_judge_prompt(&view("Timeout contacting A"), &view("A timed out"));
        let value: Value = serde_json::from_str(&prompt).unwrap();
        assert_eq!(value["a"]["canonical_summary"], "Timeout contacting A");
        assert_eq!(value["b"]["tags_top"][0], "network");
        assert_eq!(value["b"]["kind_v2_counts"]["reliability_perf"], 2);
    }

    #[test]
    fn test_parse_decision() {
        let decision =
            parse_decision("Sure!\n{\"merge\": true, \"confidence\": 0.82, \"reason\": \"same outage\"}").unwrap();
        assert!(decision.merge);
        assert!((decision.confidence - 0.82).abs() < 1e-9);
        assert_eq!(decision.reason, "same outage");

        let decision = parse_decision(r#"{"merge": false, "confidence": 7}"#).unwrap();
        assert!(!decision.merge);
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_parse_decision_rejects_garbage() {
        assert!(parse_decision("no json here").is_err());
        assert!(parse_decision(r#"{"merge": "yes"}"#).is_err());
        assert!(parse_decision(r#"{"merge": tru"#).is_err());
    }
}
