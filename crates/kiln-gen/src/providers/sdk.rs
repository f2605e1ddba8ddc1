//! Hunyuan 3D through a pooled `reqwest` client
//!
//! Only compiled with the `sdk` feature. Without it, selecting this provider
//! yields `ProviderUnavailable` with rebuild instructions.

use crate::config::KilnConfig;
use crate::provider::JobProvider;
use kiln_core::Result;

#[cfg(feature = "sdk")]
pub use client::SdkProvider;

/// Build the SDK provider, or explain why it cannot be built
#[cfg(feature = "sdk")]
pub fn create(config: &KilnConfig) -> Result<Box<dyn JobProvider>> {
    Ok(Box::new(SdkProvider::from_config(config)?))
}

#[cfg(not(feature = "sdk"))]
pub fn create(_config: &KilnConfig) -> Result<Box<dyn JobProvider>> {
    Err(kiln_core::KilnError::ProviderUnavailable {
        provider: "sdk".to_string(),
        guidance: super::sdk_install_instructions(),
    })
}

#[cfg(feature = "sdk")]
mod client {
    use super::super::{wire, ApiSettings};
    use crate::config::KilnConfig;
    use crate::job::{JobHandle, JobResult};
    use crate::materialize::{materialize_payload, DownloadedFile};
    use crate::provider::{JobProvider, JobSubmission};
    use kiln_core::{KilnError, Result};
    use std::path::Path;
    use std::time::Duration;

    const REQUEST_TIMEOUT_SECS: u64 = 60;
    const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

    /// Provider backed by a connection-pooling client
    pub struct SdkProvider {
        settings: ApiSettings,
        client: reqwest::blocking::Client,
    }

    impl SdkProvider {
        pub fn from_config(config: &KilnConfig) -> Result<Self> {
            let settings = ApiSettings::from_config(config)?;
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .map_err(|e| KilnError::Config(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self { settings, client })
        }

        fn call(&self, action: &str, payload: &str) -> std::result::Result<String, String> {
            let mut request = self.client.post(self.settings.url());
            for (name, value) in self.settings.headers(action, payload) {
                request = request.header(name, value);
            }

            request
                .body(payload.to_string())
                .send()
                .and_then(|response| response.text())
                .map_err(|e| format!("{} request failed: {}", action, e))
        }
    }

    impl JobProvider for SdkProvider {
        fn name(&self) -> &str {
            "sdk"
        }

        fn submit(&self, submission: &JobSubmission) -> Result<JobHandle> {
            let payload = wire::submit_payload(submission, &self.settings.result_format)?;
            let body = self
                .call(wire::SUBMIT_ACTION, &payload)
                .map_err(KilnError::ProviderSubmit)?;
            let job = wire::parse_submit_response(&body)?;
            tracing::info!(job_id = %job, provider = "sdk", "job submitted");
            Ok(job)
        }

        fn poll(&self, job: &JobHandle) -> Result<JobResult> {
            let payload = wire::query_payload(job)?;
            let body = self
                .call(wire::QUERY_ACTION, &payload)
                .map_err(KilnError::ProviderPoll)?;
            wire::parse_query_response(&body)
        }

        fn download_result(
            &self,
            result: &JobResult,
            output_dir: &Path,
        ) -> Result<Vec<DownloadedFile>> {
            let url = result.archive_url().ok_or_else(|| {
                KilnError::Download("Completed job has no result file URL".to_string())
            })?;

            let bytes = self
                .client
                .get(url)
                .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.bytes())
                .map_err(|e| KilnError::Download(format!("GET {} failed: {}", url, e)))?;

            tracing::debug!(bytes = bytes.len(), "downloaded result payload");
            materialize_payload(&bytes, url, output_dir)
        }
    }
}
