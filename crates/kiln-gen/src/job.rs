//! Remote job handles, statuses and poll results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a submitted remote job.
///
/// Only a successful submit creates one. It is deliberately not `Clone`:
/// the poll loop owns it for the lifetime of a single run.
#[derive(Debug, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a remote job. `Done` and `Fail` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Fail,
}

impl JobStatus {
    /// Map a service status string. Unknown values count as still running.
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_uppercase().as_str() {
            "WAIT" | "PENDING" => JobStatus::Pending,
            "DONE" => JobStatus::Done,
            "FAIL" | "FAILED" => JobStatus::Fail,
            _ => JobStatus::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Fail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloadable output reported by the service for a finished job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    /// Format tag, e.g. "OBJ" or "GLB"
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub preview_image_url: Option<String>,
}

/// The outcome of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub status: JobStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub files: Vec<ResultFile>,
}

impl JobResult {
    /// A non-terminal result with no files
    pub fn in_progress(status: JobStatus) -> Self {
        Self {
            status,
            error_code: None,
            error_message: None,
            files: Vec::new(),
        }
    }

    pub fn done(files: Vec<ResultFile>) -> Self {
        Self {
            status: JobStatus::Done,
            error_code: None,
            error_message: None,
            files,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Fail,
            error_code: None,
            error_message: Some(message.into()),
            files: Vec::new(),
        }
    }

    /// URL of the archive to download: the first OBJ result, else the first result
    pub fn archive_url(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.kind.eq_ignore_ascii_case("obj"))
            .or_else(|| self.files.first())
            .map(|f| f.url.as_str())
    }
}

/// States of the poll loop for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling,
    Done,
    Fail,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Done | PollState::Fail | PollState::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_wire() {
        assert_eq!(JobStatus::from_wire("WAIT"), JobStatus::Pending);
        assert_eq!(JobStatus::from_wire("RUN"), JobStatus::Running);
        assert_eq!(JobStatus::from_wire("done"), JobStatus::Done);
        assert_eq!(JobStatus::from_wire("FAIL"), JobStatus::Fail);
        assert_eq!(JobStatus::from_wire("SOMETHING_NEW"), JobStatus::Running);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Fail.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Done).unwrap(), "\"DONE\"");
        let parsed: JobStatus = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(parsed, JobStatus::Fail);
    }

    #[test]
    fn test_archive_url_prefers_obj() {
        let result = JobResult::done(vec![
            ResultFile {
                kind: "GLB".to_string(),
                url: "https://cdn.example.com/a.glb".to_string(),
                preview_image_url: None,
            },
            ResultFile {
                kind: "OBJ".to_string(),
                url: "https://cdn.example.com/a.zip".to_string(),
                preview_image_url: None,
            },
        ]);
        assert_eq!(result.archive_url(), Some("https://cdn.example.com/a.zip"));
    }

    #[test]
    fn test_archive_url_falls_back_to_first() {
        let result = JobResult::done(vec![ResultFile {
            kind: "GLB".to_string(),
            url: "https://cdn.example.com/a.glb".to_string(),
            preview_image_url: None,
        }]);
        assert_eq!(result.archive_url(), Some("https://cdn.example.com/a.glb"));
        assert_eq!(JobResult::done(vec![]).archive_url(), None);
    }

    #[test]
    fn test_handle_display() {
        let handle = JobHandle::new("1357924680");
        assert_eq!(handle.id(), "1357924680");
        assert_eq!(handle.to_string(), "1357924680");
    }

    #[test]
    fn test_poll_state_terminal() {
        assert!(!PollState::Submitted.is_terminal());
        assert!(!PollState::Polling.is_terminal());
        assert!(PollState::TimedOut.is_terminal());
    }
}
