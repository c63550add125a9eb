//! Nested encoding: the whole stream is one JSON array.
//!
//! Appending re-reads the array, pushes the record and rewrites the file through
//! a temporary sibling that is synced and renamed over the original, so a crash
//! mid-write leaves the previous array intact. Cost grows with stream size.

use super::{io_error, SinkError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Write an empty array if the stream is missing or empty.
pub fn initialize(path: &Path) -> Result<(), SinkError> {
    let needs_init = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };
    if needs_init {
        write_values(path, &[])?;
    }
    Ok(())
}

/// Append one record to the array and persist the result.
pub fn append_record<R: Serialize>(path: &Path, record: &R) -> Result<(), SinkError> {
    let mut values = read_values(path)?;
    let value = serde_json::to_value(record).map_err(|e| SinkError::Serialize(e.to_string()))?;
    values.push(value);
    write_values(path, &values)
}

/// Read the raw array.
pub fn read_values(path: &Path) -> Result<Vec<Value>, SinkError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content)
        .map_err(|e| SinkError::Corrupt(format!("{}: {e}", path.display())))
}

/// Read the array as typed records.
pub fn read_records<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>, SinkError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| SinkError::Corrupt(format!("{}: {e}", path.display())))
}

fn write_values(path: &Path, values: &[Value]) -> Result<(), SinkError> {
    let json =
        serde_json::to_string_pretty(values).map_err(|e| SinkError::Serialize(e.to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| io_error(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_error(path, e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initialize_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("windows.json");

        initialize(&path).unwrap();
        assert!(read_values(&path).unwrap().is_empty());
    }

    #[test]
    fn test_append_preserves_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, r#"[{"timestamp": "a"}]"#).unwrap();

        initialize(&path).unwrap();
        append_record(&path, &json!({"timestamp": "b"})).unwrap();

        let values = read_values(&path).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["timestamp"], "a");
        assert_eq!(values[1]["timestamp"], "b");
    }

    #[test]
    fn test_corrupt_stream_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipboard.json");
        std::fs::write(&path, "[{\"timestamp\": ").unwrap();

        let err = append_record(&path, &json!({"timestamp": "b"})).unwrap_err();
        assert!(matches!(err, SinkError::Corrupt(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"timestamp\": ");
    }
}
