//! Session JSONL reader that preserves malformed lines

use crate::error::Result;
use crate::types::{RawRecord, MAX_RAW_CHARS};
use serde_json::Value;
use std::path::Path;

/// Read every non-blank line of a session log as a [`RawRecord`]
///
/// Only failing to open/read the file is an error; bad lines become
/// [`RawRecord::Malformed`].
pub fn read_session(path: &Path) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)?;
    Ok(read_session_str(&content))
}

/// Parse session content already held in memory
pub fn read_session_str(content: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => records.push(RawRecord::Parsed {
                line_no,
                value: Value::Object(map),
            }),
            Ok(other) => records.push(RawRecord::Parsed {
                line_no,
                value: serde_json::json!({"_non_dict": true, "value": other}),
            }),
            Err(e) => records.push(RawRecord::Malformed {
                line_no,
                error: e.to_string(),
                raw: trimmed.chars().take(MAX_RAW_CHARS).collect(),
            }),
        }
    }

    records
}
