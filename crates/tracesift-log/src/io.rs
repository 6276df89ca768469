//! JSONL I/O and atomic file operations

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Append a JSON record to a JSONL file
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

/// Write all records to a JSONL file, replacing it atomically
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> std::io::Result<()> {
    let mut buf = BufWriter::new(Vec::new());
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.write_all(b"\n")?;
    }
    let data = buf.into_inner().map_err(|e| e.into_error())?;
    atomic_write(path, &data)
}

/// Read all records from a JSONL file
///
/// Lines that do not deserialize into `T` are skipped with a warning; use
/// [`crate::read_session`] when malformed lines must be preserved.
pub fn read_jsonl<T: for<'de> Deserialize<'de>>(path: &Path) -> std::io::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = idx + 1, "skipping malformed record: {e}");
            }
        }
    }

    Ok(records)
}

/// Write data atomically using temp file + rename
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, data)?;
    std::fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct SignalLine {
        item_id: String,
        confidence: f64,
    }

    #[test]
    fn test_jsonl_append_then_read() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("signals.jsonl");

        let records = vec![
            SignalLine {
                item_id: "sha256:aa".to_string(),
                confidence: 0.4,
            },
            SignalLine {
                item_id: "sha256:bb".to_string(),
                confidence: 0.9,
            },
        ];

        for record in &records {
            append_jsonl(&path, record).unwrap();
        }

        let read_back: Vec<SignalLine> = read_jsonl(&path).unwrap();
        assert_eq!(records, read_back);
    }

    #[test]
    fn test_write_jsonl_replaces_contents() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("out").join("signals.jsonl");

        let first = vec![SignalLine {
            item_id: "sha256:old".to_string(),
            confidence: 0.1,
        }];
        write_jsonl(&path, &first).unwrap();

        let second = vec![SignalLine {
            item_id: "sha256:new".to_string(),
            confidence: 0.2,
        }];
        write_jsonl(&path, &second).unwrap();

        let read_back: Vec<SignalLine> = read_jsonl(&path).unwrap();
        assert_eq!(read_back, second);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_read_jsonl_skips_malformed_lines() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("mixed.jsonl");
        std::fs::write(
            &path,
            "{\"item_id\":\"a\",\"confidence\":0.5}\nnot json\n\n{\"item_id\":\"b\",\"confidence\":1.0}\n",
        )
        .unwrap();

        let read_back: Vec<SignalLine> = read_jsonl(&path).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[1].item_id, "b");
    }

    #[test]
    fn test_read_jsonl_missing_file_is_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let read_back: Vec<SignalLine> = read_jsonl(&temp.path().join("nope.jsonl")).unwrap();
        assert!(read_back.is_empty());
    }

    #[test]
    fn test_atomic_write() {
        let temp = tempfile::TempDir::new().unwrap();
        let test_file = temp.path().join("rollup.json");

        let data = b"{\"rollups\":[]}";
        atomic_write(&test_file, data).unwrap();

        let read_data = std::fs::read(&test_file).unwrap();
        assert_eq!(data, read_data.as_slice());
    }
}
