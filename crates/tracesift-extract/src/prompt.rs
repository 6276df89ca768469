//! Oracle prompt construction

use serde_json::{json, Value};
use tracesift_core::{Chunk, Constraints, EventView};

const SYSTEM_PROMPT: &str = "You are a trace-mining classifier. Extract self-improvement signals from events. \
Return ONLY strict JSON: {\"items\": [...]} with no extra text. \
Kinds: error, user_frustration, improvement_suggestion, experiment_suggestion, proactive_opportunity, user_delight, other. \
proactive_opportunity = new proactive action the system should do; user_delight = opportunity to wow/delight. \
If user mentions an incident report, add tag 'incident'. \
Evidence quotes must be exact substrings of events[].text. \
Do not include PII; text is already redacted.";

/// System instruction plus JSON user payload for one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct OraclePrompt {
    pub system: String,
    pub user: String,
}

fn event_payload(view: &EventView) -> Value {
    json!({
        "i": view.i,
        "ts": view.ts,
        "role": view.role,
        "tool": view.tool,
        "status": view.status,
        "error_code": view.error_code,
        "text": view.text,
        "text_truncated": view.text_truncated,
        "raw_shape": view.raw_shape,
    })
}

fn constraints_payload(constraints: &Constraints) -> Value {
    let mut kinds: Vec<&str> = constraints.allowed_kinds.iter().map(|k| k.as_str()).collect();
    kinds.sort_unstable();
    let mut severities: Vec<&str> = constraints
        .allowed_severities
        .iter()
        .map(|s| s.as_str())
        .collect();
    severities.sort_unstable();
    json!({
        "max_items_per_chunk": constraints.max_items_per_chunk,
        "max_evidence_per_item": constraints.max_evidence_per_item,
        "max_summary_chars": constraints.max_summary_chars,
        "max_quote_chars": constraints.max_quote_chars,
        "allowed_kinds": kinds,
        "allowed_severities": severities,
    })
}

fn schema_payload(constraints: &Constraints) -> Value {
    json!({
        "items": [{
            "kind": "error",
            "summary": format!("one line <= {} chars", constraints.max_summary_chars),
            "severity": "low|medium|high|critical|unknown",
            "confidence": 0.0,
            "tags": ["string"],
            "evidence": [{
                "event_i": 0,
                "role": "user|assistant|tool_result|tool_call|system|other",
                "field_path": "text",
                "quote": "exact substring from events[i].text",
            }],
            "proposed_fix": {
                "fix_type": "prompt|code|process|dependency|eval|other",
                "description": "concise fix",
            },
        }]
    })
}

/// Build the oracle request for a chunk
pub fn build_prompt(chunk: &Chunk, constraints: &Constraints) -> OraclePrompt {
    let payload = json!({
        "chunk_id": chunk.chunk_id,
        "constraints": constraints_payload(constraints),
        "schema": schema_payload(constraints),
        "events": chunk.views.iter().map(event_payload).collect::<Vec<_>>(),
    });
    OraclePrompt {
        system: SYSTEM_PROMPT.to_string(),
        user: serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
    }
}
