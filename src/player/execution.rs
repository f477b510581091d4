use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};

/// Append-only log entry for one script run. Produced by the Player,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub script_id: String,
    pub script_name: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub total_steps: usize,
    pub success_steps: usize,
    pub failed_steps: usize,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extracted_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

/// JSON-lines history next to the script library.
pub struct ExecutionLog {
    path: PathBuf,
}

impl ExecutionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, record: &ExecutionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AutomationError::Internal(anyhow::anyhow!("history dir: {e}")))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("history open: {e}")))?;
        let line = serde_json::to_string(record)
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("history encode: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| AutomationError::Internal(anyhow::anyhow!("history write: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExecutionRecord {
        ExecutionRecord {
            id: "run-1".into(),
            script_id: "s-1".into(),
            script_name: "login".into(),
            start_time: chrono::Utc::now(),
            end_time: chrono::Utc::now(),
            duration_ms: 1200,
            total_steps: 3,
            success_steps: 3,
            failed_steps: 0,
            success: true,
            message: "completed".into(),
            error_msg: None,
            extracted_data: serde_json::Map::new(),
            video_path: None,
        }
    }

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExecutionLog::new(dir.path().join("history.jsonl"));
        log.append(&sample()).unwrap();
        log.append(&sample()).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("history.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: ExecutionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.script_name, "login");
    }
}
