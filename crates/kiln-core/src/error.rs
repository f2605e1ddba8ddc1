//! Error types for Kiln

use thiserror::Error;

/// The main error type for Kiln operations
#[derive(Debug, Error)]
pub enum KilnError {
    /// Caller misuse. Raised before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job submission failed: {0}")]
    ProviderSubmit(String),

    #[error("Job status check failed: {0}")]
    ProviderPoll(String),

    #[error("Provider '{provider}' is unavailable: {guidance}")]
    ProviderUnavailable { provider: String, guidance: String },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error(
        "Job {job_id} did not complete within {timeout_secs} seconds \
         (elapsed {elapsed_secs:.1}s, last status: {last_status})"
    )]
    JobTimeout {
        job_id: String,
        timeout_secs: u64,
        elapsed_secs: f64,
        last_status: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl KilnError {
    /// Prefix the message with the job id, elapsed time and last seen status
    /// so a caller can resume the job by hand. The variant is preserved;
    /// variants without a free-form message are returned unchanged.
    pub fn with_job_context(self, job_id: &str, elapsed_secs: f64, last_status: &str) -> Self {
        let prefix = format!(
            "job {} (elapsed {:.1}s, last status {})",
            job_id, elapsed_secs, last_status
        );
        let wrap = |msg: String| format!("{}: {}", prefix, msg);
        match self {
            KilnError::InvalidInput(m) => KilnError::InvalidInput(wrap(m)),
            KilnError::ProviderSubmit(m) => KilnError::ProviderSubmit(wrap(m)),
            KilnError::ProviderPoll(m) => KilnError::ProviderPoll(wrap(m)),
            KilnError::Download(m) => KilnError::Download(wrap(m)),
            KilnError::Upload(m) => KilnError::Upload(wrap(m)),
            KilnError::Config(m) => KilnError::Config(wrap(m)),
            KilnError::TomlParseError(m) => KilnError::TomlParseError(wrap(m)),
            KilnError::IoError(e) => {
                KilnError::IoError(std::io::Error::new(e.kind(), wrap(e.to_string())))
            }
            other => other,
        }
    }
}

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::TomlParseError(err.to_string())
    }
}
