//! Hunyuan 3D over plain HTTPS
//!
//! Each call is one signed JSON POST through a blocking `ureq` agent.
//! Nothing here retries: a failed call surfaces to the run.

use super::{wire, ApiSettings};
use crate::config::KilnConfig;
use crate::job::{JobHandle, JobResult};
use crate::materialize::{materialize_payload, DownloadedFile};
use crate::provider::{JobProvider, JobSubmission};
use kiln_core::{KilnError, Result};
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;
/// Result archives bundle the mesh with its textures
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Default provider for the Hunyuan 3D API
pub struct HttpProvider {
    settings: ApiSettings,
    agent: ureq::Agent,
    download_agent: ureq::Agent,
}

impl HttpProvider {
    /// Create a new HttpProvider from config
    pub fn from_config(config: &KilnConfig) -> Result<Self> {
        Ok(Self {
            settings: ApiSettings::from_config(config)?,
            agent: build_agent(REQUEST_TIMEOUT_SECS),
            download_agent: build_agent(DOWNLOAD_TIMEOUT_SECS),
        })
    }

    /// POST a signed action and return the raw response body
    fn call(&self, action: &str, payload: &str) -> std::result::Result<String, String> {
        let url = self.settings.url();
        let mut request = self.agent.post(&url);
        for (name, value) in self.settings.headers(action, payload) {
            request = request.header(name, &value);
        }

        let mut response = request
            .send(payload)
            .map_err(|e| format!("{} request failed: {}", action, e))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| format!("Failed to read {} response: {}", action, e))
    }

    fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .download_agent
            .get(url)
            .call()
            .map_err(|e| KilnError::Download(format!("GET {} failed: {}", url, e)))?;

        let mut reader = response.into_body().into_reader();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut bytes)
            .map_err(|e| KilnError::Download(format!("Failed to read result payload: {}", e)))?;
        Ok(bytes)
    }
}

impl JobProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn submit(&self, submission: &JobSubmission) -> Result<JobHandle> {
        let payload = wire::submit_payload(submission, &self.settings.result_format)?;
        let body = self
            .call(wire::SUBMIT_ACTION, &payload)
            .map_err(KilnError::ProviderSubmit)?;
        let job = wire::parse_submit_response(&body)?;
        tracing::info!(job_id = %job, provider = "http", "job submitted");
        Ok(job)
    }

    fn poll(&self, job: &JobHandle) -> Result<JobResult> {
        let payload = wire::query_payload(job)?;
        let body = self
            .call(wire::QUERY_ACTION, &payload)
            .map_err(KilnError::ProviderPoll)?;
        wire::parse_query_response(&body)
    }

    fn download_result(&self, result: &JobResult, output_dir: &Path) -> Result<Vec<DownloadedFile>> {
        let url = result.archive_url().ok_or_else(|| {
            KilnError::Download("Completed job has no result file URL".to_string())
        })?;

        let bytes = self.download_bytes(url)?;
        tracing::debug!(bytes = bytes.len(), "downloaded result payload");
        materialize_payload(&bytes, url, output_dir)
    }
}

fn build_agent(timeout_secs: u64) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build();
    config.into()
}
