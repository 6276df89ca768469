#![allow(dead_code)]

use serde_json::json;
use std::path::Path;
use tracesift_core::{Evidence, Kind, Role, Severity, Signal, SignalSource, Span};

pub fn write_session(root: &Path, rel: &str, lines: &[String]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, lines.join("\n")).unwrap();
}

pub fn user(text: &str) -> String {
    json!({"message": {"role": "user", "content": text}}).to_string()
}

pub fn assistant(text: &str) -> String {
    json!({"message": {"role": "assistant", "content": [{"type": "text", "text": text}]}}).to_string()
}

pub fn system(text: &str) -> String {
    json!({"message": {"role": "system", "content": text}}).to_string()
}

pub fn tool_call(tool: &str, command: &str) -> String {
    json!({"message": {"role": "toolCall", "toolName": tool, "content": command}}).to_string()
}

pub fn tool_failure(tool: &str, output: &str, exit_code: i64) -> String {
    json!({
        "message": {
            "role": "toolResult",
            "toolName": tool,
            "content": output,
            "details": {"status": "error", "exitCode": exit_code}
        }
    })
    .to_string()
}

pub fn header() -> String {
    json!({"type": "session", "id": "fixture"}).to_string()
}

/// Header, then 20 events with a tool call at record 10 and its result at 11
pub fn chunk_example_lines() -> Vec<String> {
    let mut lines = vec![header()];
    for i in 1..=20 {
        let line = match i {
            10 => tool_call("bash", "cargo test"),
            11 => tool_failure("bash", "test result: FAILED", 101),
            _ => system(&format!("status note {i}")),
        };
        lines.push(line);
    }
    lines
}

/// Session with secrets sprinkled through user and tool text
pub fn leaky_session_lines() -> Vec<String> {
    vec![
        header(),
        user("I am confused, mail alice@example.com about /home/alice/notes.txt"),
        assistant("Looking into it."),
        tool_call("bash", "curl https://svc.example.com/hook?token=abc123secret"),
        tool_failure(
            "bash",
            "auth failed for key sk-live1234567890abcdef at https://svc.example.com/hook?token=abc123secret",
            22,
        ),
        assistant("We should retry with a fresh key."),
    ]
}

pub const SECRETS: &[&str] = &[
    "alice@example.com",
    "/home/alice",
    "abc123secret",
    "sk-live1234567890abcdef",
];

pub fn signal(session: &str, kind: Kind, summary: &str, severity: Severity, tags: &[&str]) -> Signal {
    Signal {
        schema_version: 1,
        item_id: format!("sha256:{session}:{summary}"),
        session_id: session.to_string(),
        source: SignalSource {
            file_hint: session.to_string(),
            chunk_id: format!("{session}/chunk:0"),
        },
        kind,
        summary: summary.to_string(),
        severity,
        confidence: 0.5,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        span: Span { start_i: 1, end_i: 1 },
        evidence: vec![Evidence {
            event_i: 1,
            role: Role::ToolResult,
            field_path: "text".to_string(),
            quote: "quote".to_string(),
        }],
        proposed_fix: None,
    }
}
