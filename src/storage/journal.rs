//! Append-only JSON-lines journal of execution records

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use crate::errors::{AutopayError, AutopayResult};
use crate::types::{EXECUTION_RECORD_SCHEMA_VERSION, ExecutionRecord};

pub struct ExecutionJournal {
    dir: PathBuf,
}

impl ExecutionJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for_today(&self) -> PathBuf {
        self.dir.join(format!("executions_{}.jsonl", Utc::now().format("%Y-%m-%d")))
    }

    pub fn append(&self, record: &ExecutionRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let filename = self.path_for_today();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        writeln!(file, "{}", serde_json::to_string(record)?)?;

        info!(
            execution_id = %record.id,
            subscription_id = %record.subscription_id,
            status = ?record.status,
            output = ?record.output_amount,
            "Saved execution record"
        );

        Ok(())
    }
}

/// Rejects records written under a schema version this build does not know.
pub fn decode_record_line(line: &str) -> AutopayResult<ExecutionRecord> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| AutopayError::validation("executionRecord", e.to_string()))?;
    let version = value.get("schemaVersion").and_then(|v| v.as_u64());
    if version != Some(EXECUTION_RECORD_SCHEMA_VERSION as u64) {
        return Err(AutopayError::validation(
            "schemaVersion",
            format!("unsupported execution record version {:?}", version),
        ));
    }
    serde_json::from_value(value).map_err(|e| AutopayError::validation("executionRecord", e.to_string()))
}

pub fn read_journal(path: &Path) -> Result<Vec<ExecutionRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| decode_record_line(line).map_err(anyhow::Error::from))
        .collect()
}
