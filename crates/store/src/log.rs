use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, StoreError};
use crate::model::{Goal, KeyResult};

/// One finalized day as archived in the completion log.
///
/// Field names are camelCase on the wire; the record shape is shared with
/// external log viewers, so it stays stable even where the in-process model
/// differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub date: String,
    pub objective: String,
    pub tasks: Vec<TaskRecord>,
    pub total_time: String,
    pub time_range: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    /// Snapshot a goal at finalization time.  `completed_at` is stamped now.
    pub fn from_goal(goal: &Goal, total_time: impl Into<String>, time_range: impl Into<String>) -> Self {
        Self {
            date: goal.date.clone(),
            objective: goal.objective.clone(),
            tasks: goal.key_results.iter().map(TaskRecord::from).collect(),
            total_time: total_time.into(),
            time_range: time_range.into(),
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub content: String,
    pub weight: u8,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
}

impl From<&KeyResult> for TaskRecord {
    fn from(kr: &KeyResult) -> Self {
        Self {
            content: kr.content.clone(),
            weight: kr.weight,
            completed: kr.completed,
            completion_time: kr.completion_time.clone(),
        }
    }
}

/// Append-only JSONL history of finalized days.
///
/// Records are immutable once written; the mutable goal files carry only
/// the current day, this log carries everything before it.
#[derive(Debug, Clone)]
pub struct CompletionLog {
    path: PathBuf,
}

impl CompletionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional log location inside a store's todos directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("completion_log.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &CompletionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        let line = serde_json::to_string(record)?;
        let io = |e| StoreError::io(&self.path, e);
        file.write_all(line.as_bytes()).await.map_err(io)?;
        file.write_all(b"\n").await.map_err(io)?;
        // Flush userspace buffers and fsync so the record survives a crash
        // immediately after finalizing the day.
        file.flush().await.map_err(io)?;
        file.sync_all().await.map_err(io)?;
        tracing::info!(date = %record.date, path = %self.path.display(), "completion record appended");
        Ok(())
    }

    /// Read every record in the log.  Corrupt lines are skipped with a
    /// warning rather than failing the whole read.
    pub fn load(&self) -> Result<Vec<CompletionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut corrupt = 0usize;

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(|e| StoreError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CompletionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    corrupt += 1;
                    tracing::warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt completion record, skipping line"
                    );
                }
            }
        }

        if corrupt > 0 {
            tracing::warn!(
                corrupt_lines = corrupt,
                path = %self.path.display(),
                "completion log loaded with skipped corrupt lines"
            );
        }

        Ok(records)
    }
}
