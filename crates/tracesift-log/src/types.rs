//! Raw session record types

use serde_json::Value;

/// Maximum characters of an unparseable line kept for diagnostics
pub(crate) const MAX_RAW_CHARS: usize = 2000;

/// One line of a session log, in file order
///
/// Parse failures are kept as records so the normalizer can surface them
/// instead of silently dropping the line.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// A line that parsed as JSON
    Parsed { line_no: usize, value: Value },
    /// A line that failed to parse
    Malformed {
        line_no: usize,
        error: String,
        raw: String,
    },
}

impl RawRecord {
    /// 1-based line number in the source file
    pub fn line_no(&self) -> usize {
        match self {
            RawRecord::Parsed { line_no, .. } | RawRecord::Malformed { line_no, .. } => *line_no,
        }
    }

    /// Parsed JSON object, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            RawRecord::Parsed { value, .. } => Some(value),
            RawRecord::Malformed { .. } => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RawRecord::Malformed { .. })
    }
}
