//! File I/O utilities with atomic writes
//!
//! Snapshot files (profiles, budgets, transactions) are rewritten atomically.
//! The redistribution log is append-only JSON lines.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::AllowanceError;

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, AllowanceError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path).map_err(|e| {
        AllowanceError::Storage(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        AllowanceError::Storage(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), AllowanceError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AllowanceError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Temp file must live in the same directory for rename to be atomic
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| AllowanceError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| AllowanceError::Storage(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| AllowanceError::Storage(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| AllowanceError::Storage(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        AllowanceError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Append records to a JSON-lines file, one object per line
pub fn append_jsonl<T, P>(path: P, records: &[T]) -> Result<(), AllowanceError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    if records.is_empty() {
        return Ok(());
    }
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AllowanceError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AllowanceError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    for record in records {
        let json = serde_json::to_string(record)
            .map_err(|e| AllowanceError::Json(format!("Failed to serialize record: {}", e)))?;
        writeln!(file, "{}", json)
            .map_err(|e| AllowanceError::Io(format!("Failed to write record: {}", e)))?;
    }

    file.flush()
        .map_err(|e| AllowanceError::Io(format!("Failed to flush {}: {}", path.display(), e)))?;

    Ok(())
}

/// Read every record from a JSON-lines file (oldest first); missing file is empty
pub fn read_jsonl<T, P>(path: P) -> Result<Vec<T>, AllowanceError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| AllowanceError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut records = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            AllowanceError::Io(format!("Failed to read line {}: {}", line_num + 1, e))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|e| {
            AllowanceError::Json(format!(
                "Failed to parse {} at line {}: {}",
                path.display(),
                line_num + 1,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_read_nonexistent_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let data: TestData = read_json(&path).unwrap();
        assert_eq!(data, TestData::default());
    }

    #[test]
    fn test_atomic_write_no_temp_file_left() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("test.json");
        let temp_path = temp_dir.path().join("nested").join("test.json.tmp");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        write_json_atomic(&path, &data).unwrap();

        assert!(!temp_path.exists());
        let loaded: TestData = read_json(&path).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_jsonl_append_accumulates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.jsonl");

        let first = TestData {
            name: "a".into(),
            value: 1,
        };
        let second = TestData {
            name: "b".into(),
            value: 2,
        };
        append_jsonl(&path, std::slice::from_ref(&first)).unwrap();
        append_jsonl(&path, std::slice::from_ref(&second)).unwrap();
        append_jsonl::<TestData, _>(&path, &[]).unwrap();

        let records: Vec<TestData> = read_jsonl(&path).unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn test_read_jsonl_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let records: Vec<TestData> = read_jsonl(temp_dir.path().join("none.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_read_jsonl_reports_bad_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        fs::write(&path, "{\"name\":\"a\",\"value\":1}\nnot json\n").unwrap();

        let err = read_jsonl::<TestData, _>(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
