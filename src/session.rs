use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::TARGET_SESSION;

/// Append-only key/value record of one pipeline run: row counts, duplicate
/// counts, quantile distribution, edge-case counts and timings. Stages only
/// ever append; nothing is rewritten.
#[derive(Debug, Default, Serialize)]
pub struct SessionLog {
    entries: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub key: String,
    pub value: Value,
}

impl SessionLog {
    pub fn append(&mut self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.entries.push(LogEntry {
            key: key.to_string(),
            value,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Latest value recorded under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }
}

/// One pipeline run: a date/time-stamped directory under the configured
/// output directory, holding the partitions, label tables and session log.
pub struct Session {
    pub root: PathBuf,
    pub started_at: DateTime<Local>,
    pub log: SessionLog,
}

impl Session {
    pub fn create(output_dir: &Path) -> Result<Self> {
        let started_at = Local::now();
        let root = output_dir
            .join(started_at.format("%Y_%m_%d").to_string())
            .join(started_at.format("%H.%M").to_string());
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create session directory {}", root.display()))?;

        let mut log = SessionLog::default();
        log.append("SessionDate", started_at.format("%Y_%m_%d").to_string());
        log.append("SessionTime", started_at.format("%H:%M:%S").to_string());
        log.append("SessionPath", root.display().to_string());

        info!(
            target: TARGET_SESSION,
            "session beginning at {} ({})",
            started_at.format("%H:%M:%S"),
            root.display()
        );

        Ok(Session {
            root,
            started_at,
            log,
        })
    }

    /// Directory for the accepted/diverted/complete partitions.
    pub fn transformed_dir(&self) -> PathBuf {
        self.root.join("transformed")
    }

    /// Directory for the per-label entity tables.
    pub fn extracts_dir(&self) -> PathBuf {
        self.root.join("extracts")
    }

    pub fn write_log(&self) -> Result<PathBuf> {
        let path = self.root.join("log.json");
        let payload =
            serde_json::to_string_pretty(&self.log).context("failed to serialize session log")?;
        fs::write(&path, payload)
            .with_context(|| format!("failed to write session log {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_appends_in_order() {
        let mut log = SessionLog::default();
        log.append("NumberOfRecords", 10);
        log.append("NullValues", 2);
        let keys: Vec<&str> = log.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["NumberOfRecords", "NullValues"]);
        assert_eq!(log.get("NullValues"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_log_get_returns_latest() {
        let mut log = SessionLog::default();
        log.append("AcceptedRows", 5);
        log.append("AcceptedRows", 7);
        assert_eq!(log.get("AcceptedRows"), Some(&serde_json::json!(7)));
        // Both entries are retained; append never rewrites.
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn test_session_creates_directory_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::create(dir.path()).unwrap();
        assert!(session.root.exists());
        let log_path = session.write_log().unwrap();
        let raw = std::fs::read_to_string(log_path).unwrap();
        assert!(raw.contains("SessionPath"));
    }
}
