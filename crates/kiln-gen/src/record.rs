//! Run records
//!
//! Every run that reaches a terminal remote status leaves a `metadata.json`
//! next to its output files, recording what was asked, what came back and
//! how long it took.

use crate::job::JobStatus;
use crate::materialize::DownloadedFile;
use chrono::{DateTime, Local};
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const RECORD_FILE_NAME: &str = "metadata.json";

/// The persisted outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub input_type: String,
    pub input_value: String,
    pub created_at: DateTime<Local>,
    pub completed_at: DateTime<Local>,
    pub elapsed_seconds: f64,
    pub files: Vec<String>,
    pub canonical_artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Fields shared by successful and failed records
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub job_id: String,
    pub input_type: String,
    pub input_value: String,
    pub created_at: DateTime<Local>,
}

impl RunRecord {
    /// Record for a job that finished and was downloaded
    pub fn done(
        ctx: RecordContext,
        files: &[DownloadedFile],
        canonical: Option<&DownloadedFile>,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            job_id: ctx.job_id,
            status: JobStatus::Done,
            input_type: ctx.input_type,
            input_value: ctx.input_value,
            created_at: ctx.created_at,
            completed_at: Local::now(),
            elapsed_seconds,
            files: files.iter().map(|f| f.name.clone()).collect(),
            canonical_artifact: canonical.map(|f| f.name.clone()),
            error_message: None,
        }
    }

    /// Record for a job the service reported as failed
    pub fn failed(ctx: RecordContext, message: &str, elapsed_seconds: f64) -> Self {
        Self {
            job_id: ctx.job_id,
            status: JobStatus::Fail,
            input_type: ctx.input_type,
            input_value: ctx.input_value,
            created_at: ctx.created_at,
            completed_at: Local::now(),
            elapsed_seconds,
            files: Vec::new(),
            canonical_artifact: None,
            error_message: Some(message.to_string()),
        }
    }

    /// Write the record to `metadata.json` in `dir`, replacing any previous one
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(RECORD_FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Load a record written by [`RunRecord::write`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            KilnError::Config(format!("Failed to parse run record {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln_record_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn ctx() -> RecordContext {
        RecordContext {
            job_id: "1357924680".to_string(),
            input_type: "prompt".to_string(),
            input_value: "a cute panda figurine".to_string(),
            created_at: Local::now(),
        }
    }

    fn file(name: &str, size: u64) -> DownloadedFile {
        DownloadedFile {
            name: name.to_string(),
            path: PathBuf::from(name),
            size,
        }
    }

    #[test]
    fn test_done_record_roundtrip() {
        let dir = temp_dir();
        let files = vec![file("model.obj", 12000), file("model.mtl", 90), file("albedo.png", 900)];
        let record = RunRecord::done(ctx(), &files, Some(&files[0]), 42.5);

        let path = record.write(&dir).unwrap();
        assert_eq!(path, dir.join("metadata.json"));

        let loaded = RunRecord::load(&path).unwrap();
        assert_eq!(loaded.job_id, "1357924680");
        assert_eq!(loaded.files, vec!["model.obj", "model.mtl", "albedo.png"]);
        assert_eq!(loaded.canonical_artifact.as_deref(), Some("model.obj"));
        assert_eq!(loaded.status, JobStatus::Done);
        assert!(loaded.error_message.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_done_record_json_shape() {
        let record = RunRecord::done(ctx(), &[file("texture.png", 5)], None, 1.0);
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "DONE");
        assert!(json["canonical_artifact"].is_null());
        assert!(json.get("error_message").is_none());
        assert!(json["created_at"].as_str().unwrap().contains('T'));
        assert_eq!(json["elapsed_seconds"], 1.0);
    }

    #[test]
    fn test_failed_record_carries_message() {
        let dir = temp_dir();
        let record = RunRecord::failed(ctx(), "quota exceeded", 12.0);
        let path = record.write(&dir).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "FAIL");
        assert_eq!(json["error_message"], "quota exceeded");
        assert_eq!(json["files"].as_array().unwrap().len(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_replaces_previous_record() {
        let dir = temp_dir();
        RunRecord::failed(ctx(), "first", 1.0).write(&dir).unwrap();
        let path = RunRecord::done(ctx(), &[], None, 2.0).write(&dir).unwrap();

        let loaded = RunRecord::load(&path).unwrap();
        assert_eq!(loaded.status, JobStatus::Done);
        assert!(loaded.error_message.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = temp_dir();
        let path = dir.join(RECORD_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(RunRecord::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
