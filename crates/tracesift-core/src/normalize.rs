//! Event normalizer: raw session records to uniform event views

use crate::config::MinerConfig;
use crate::redact::redact;
use crate::text::{digest, prefix_chars};
use crate::types::{EventView, Role};
use serde_json::{Map, Value};
use tracesift_log::RawRecord;

const METADATA_TYPES: &[&str] = &["session", "heartbeat", "meta", "metadata"];
const TOOL_KEYS: &[&str] = &["tool", "tool_name", "toolName", "name"];
const ERROR_CODE_KEYS: &[&str] = &["error_code", "errorCode", "code"];
const FLAT_TEXT_KEYS: &[&str] = &["content", "text", "error", "stderr", "stdout"];
const OBJECT_TEXT_KEYS: &[&str] = &["text", "error", "stderr", "stdout", "output"];
const DETAIL_STREAM_KEYS: &[&str] = &["stderr", "stdout", "aggregated"];

/// Converts raw records into [`EventView`]s
#[derive(Debug, Clone)]
pub struct Normalizer {
    max_text_chars: usize,
    redact: bool,
}

impl Normalizer {
    pub fn new(max_text_chars: usize, redact: bool) -> Self {
        Self {
            max_text_chars,
            redact,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(config.max_text_chars, config.redact_events)
    }

    /// Normalize a whole session; `i` is the record's position in `records`
    pub fn views(&self, records: &[RawRecord]) -> Vec<EventView> {
        let views: Vec<EventView> = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| self.normalize(i, record))
            .collect();
        tracing::debug!(
            records = records.len(),
            views = views.len(),
            "normalized session records"
        );
        views
    }

    /// Normalize one record, or `None` for metadata and empty records
    pub fn normalize(&self, i: usize, record: &RawRecord) -> Option<EventView> {
        match record {
            RawRecord::Malformed {
                line_no,
                error,
                raw,
            } => {
                let text = format!("parse error at line {line_no}: {error}\n{raw}");
                let (text, text_truncated) = self.digest_text(&text);
                Some(EventView {
                    i,
                    ts: None,
                    role: Role::ParseError,
                    tool: None,
                    status: None,
                    error_code: None,
                    text,
                    text_truncated,
                    raw_shape: Some("_parse_error".to_string()),
                })
            }
            RawRecord::Parsed { value, .. } => self.normalize_value(i, value),
        }
    }

    fn normalize_value(&self, i: usize, value: &Value) -> Option<EventView> {
        let event = value.as_object()?;
        if is_metadata(event) {
            return None;
        }

        let role = event_role(event);
        let tool = event_tool(event);
        let status = event_status(event);
        let error_code = event_error_code(event);
        let ts = str_field(event, "timestamp").map(str::to_string);

        let (raw_text, raw_shape) = event_text(event, role, tool.as_deref());
        let (text, text_truncated) = self.digest_text(&raw_text);
        if text.is_empty() && role == Role::Other {
            return None;
        }

        Some(EventView {
            i,
            ts,
            role,
            tool,
            status,
            error_code,
            text,
            text_truncated,
            raw_shape: Some(raw_shape.to_string()),
        })
    }

    fn digest_text(&self, raw: &str) -> (String, bool) {
        let raw = raw.trim();
        if raw.is_empty() {
            return (String::new(), false);
        }
        if self.redact {
            digest(&redact(raw), self.max_text_chars)
        } else {
            digest(raw, self.max_text_chars)
        }
    }
}

fn message(event: &Map<String, Value>) -> Option<&Map<String, Value>> {
    event.get("message").and_then(Value::as_object)
}

fn details(event: &Map<String, Value>) -> Option<&Map<String, Value>> {
    message(event)
        .and_then(|m| m.get("details"))
        .and_then(Value::as_object)
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    str_field(map, key).filter(|s| !s.is_empty())
}

fn is_metadata(event: &Map<String, Value>) -> bool {
    if message(event).is_some() {
        return false;
    }
    str_field(event, "type").is_some_and(|t| METADATA_TYPES.contains(&t))
}

fn event_role(event: &Map<String, Value>) -> Role {
    if let Some(role) = message(event).and_then(|m| str_field(m, "role")) {
        return Role::from_raw(role);
    }
    str_field(event, "role")
        .or_else(|| str_field(event, "type"))
        .map(Role::from_raw)
        .unwrap_or(Role::Other)
}

fn event_tool(event: &Map<String, Value>) -> Option<String> {
    if let Some(tool) = message(event).and_then(|m| str_field(m, "toolName")) {
        return Some(tool.to_string());
    }
    TOOL_KEYS
        .iter()
        .find_map(|k| non_empty_str(event, k))
        .map(str::to_string)
}

fn event_status(event: &Map<String, Value>) -> Option<String> {
    details(event)
        .and_then(|d| str_field(d, "status"))
        .or_else(|| str_field(event, "status"))
        .map(str::to_string)
}

fn event_error_code(event: &Map<String, Value>) -> Option<String> {
    let details = details(event);
    if let Some(code) = details.and_then(|d| ERROR_CODE_KEYS.iter().find_map(|k| non_empty_str(d, k)))
    {
        return Some(code.to_string());
    }
    if let Some(code) = ERROR_CODE_KEYS.iter().find_map(|k| non_empty_str(event, k)) {
        return Some(code.to_string());
    }

    let exit_code = details
        .and_then(|d| d.get("exitCode"))
        .or_else(|| event.get("exitCode"))
        .and_then(Value::as_i64);
    match exit_code {
        Some(code) if code != 0 => Some(format!("EXIT_{code}")),
        _ => None,
    }
}

fn compact_json(value: &Value, max_chars: usize) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    prefix_chars(&json, max_chars).to_string()
}

/// Flatten a content field into plain text
fn content_text(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::String(_) => None,
                Value::Object(obj) => match non_empty_str(obj, "text") {
                    Some(t) => Some(t.to_string()),
                    None => Some(compact_json(item, 2000)),
                },
                other => Some(compact_json(other, 2000)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => OBJECT_TEXT_KEYS
            .iter()
            .find_map(|k| non_empty_str(obj, k))
            .map(str::to_string)
            .unwrap_or_else(|| compact_json(value, 4000)),
        other => compact_json(other, 4000),
    }
}

fn event_text(
    event: &Map<String, Value>,
    role: Role,
    tool: Option<&str>,
) -> (String, &'static str) {
    let mut parts: Vec<String> = Vec::new();
    let mut shape = "event";

    if let Some(msg) = message(event) {
        match role {
            Role::ToolResult => {
                shape = "message.details+content";
                if let Some(tool) = tool {
                    parts.push(format!("tool={tool}"));
                }
                if let Some(details) = msg.get("details").and_then(Value::as_object) {
                    if let Some(status) = str_field(details, "status") {
                        parts.push(format!("status={status}"));
                    }
                    if let Some(exit_code) = details.get("exitCode").and_then(Value::as_i64) {
                        parts.push(format!("exitCode={exit_code}"));
                    }
                    match details.get("error") {
                        Some(Value::String(s)) if !s.is_empty() => parts.push(format!("error={s}")),
                        Some(Value::Null) | Some(Value::Bool(false)) | None => {}
                        Some(Value::String(_)) => {}
                        Some(other) => parts.push(format!("error={}", compact_json(other, 2000))),
                    }
                    for key in DETAIL_STREAM_KEYS {
                        if let Some(stream) = non_empty_str(details, key) {
                            parts.push(stream.to_string());
                        }
                    }
                }
                parts.push(content_text(msg.get("content")));
            }
            Role::ToolCall => {
                shape = "message.input";
                parts.push(content_text(msg.get("input")));
                parts.push(content_text(msg.get("content")));
            }
            _ => {
                shape = "message.content";
                parts.push(content_text(msg.get("content")));
            }
        }
    }

    let mut text = join_parts(&parts);
    if text.is_empty() {
        let flat: Vec<String> = FLAT_TEXT_KEYS
            .iter()
            .filter_map(|k| non_empty_str(event, k))
            .map(str::to_string)
            .collect();
        text = join_parts(&flat);
    }
    (text, shape)
}

fn join_parts(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
