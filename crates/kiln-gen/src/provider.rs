//! Job provider trait and submission types

use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::job::{JobHandle, JobResult};
use crate::materialize::DownloadedFile;
use crate::request::ViewKind;

/// Transport used to talk to the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Plain HTTPS calls through `ureq`
    #[default]
    Http,
    /// Pooled client, only present in builds with the `sdk` feature
    Sdk,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Http, ProviderKind::Sdk];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Http => "http",
            ProviderKind::Sdk => "sdk",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(ProviderKind::Http),
            "sdk" => Ok(ProviderKind::Sdk),
            other => Err(KilnError::Config(format!(
                "Invalid provider '{}'. Valid options: http, sdk",
                other
            ))),
        }
    }
}

/// A view image that has already been uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewImageUrl {
    pub view: ViewKind,
    pub image_url: String,
}

/// Everything the service needs to start a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSubmission {
    pub prompt: Option<String>,
    pub image_url: Option<String>,
    pub multi_view_images: Vec<ViewImageUrl>,
}

/// Trait implemented by each transport to the generation service
pub trait JobProvider: Send {
    /// Provider name (e.g. "http", "sdk")
    fn name(&self) -> &str;

    /// Start a remote job
    fn submit(&self, submission: &JobSubmission) -> Result<JobHandle>;

    /// Check the job's status once. Never sleeps.
    fn poll(&self, job: &JobHandle) -> Result<JobResult>;

    /// Fetch and extract the payload of a finished job into `output_dir`
    fn download_result(&self, result: &JobResult, output_dir: &Path)
        -> Result<Vec<DownloadedFile>>;
}
