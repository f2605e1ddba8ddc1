//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `TENCENT_SECRET_ID`, `TENCENT_SECRET_KEY`,
//!    `TENCENT_COS_BUCKET`, `TENCENT_COS_REGION`, `KILN_PROVIDER`
//! 2. Project-local: `.kiln/config.toml`
//! 3. Global: `~/.kiln/config.toml`

use crate::provider::ProviderKind;
use crate::providers::wire;
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TENCENT_SECRET_ID_ENV: &str = "TENCENT_SECRET_ID";
pub const TENCENT_SECRET_KEY_ENV: &str = "TENCENT_SECRET_KEY";
pub const TENCENT_COS_BUCKET_ENV: &str = "TENCENT_COS_BUCKET";
pub const TENCENT_COS_REGION_ENV: &str = "TENCENT_COS_REGION";
pub const KILN_PROVIDER_ENV: &str = "KILN_PROVIDER";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_MAX_POLL_INTERVAL_SECS: u64 = 60;

/// API credentials for the generation service and the object store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub secret_id: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Object storage used to host local input images
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Resolved generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub provider: ProviderKind,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    pub max_poll_interval_secs: u64,
    pub region: String,
    pub endpoint: Option<String>,
    pub result_format: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationFileConfig::default().resolve()
    }
}

/// `[generation]` as written in a config file. Unset keys fall through to
/// the layer below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationFileConfig {
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub result_format: Option<String>,
}

impl GenerationFileConfig {
    fn resolve(self) -> GenerationConfig {
        GenerationConfig {
            provider: self.provider.unwrap_or_default(),
            poll_interval_secs: self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_poll_interval_secs: self
                .max_poll_interval_secs
                .unwrap_or(DEFAULT_MAX_POLL_INTERVAL_SECS),
            region: self
                .region
                .unwrap_or_else(|| wire::DEFAULT_REGION.to_string()),
            endpoint: self.endpoint,
            result_format: self
                .result_format
                .unwrap_or_else(|| wire::DEFAULT_RESULT_FORMAT.to_string()),
        }
    }
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KilnConfigFile {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationFileConfig,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct KilnConfig {
    pub credentials: CredentialsConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
}

impl KilnConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = KilnConfigFile::default();

        // Layer 1: Global config (~/.kiln/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        // Layer 2: Project-local config (.kiln/config.toml)
        let local_path = PathBuf::from(".kiln/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        // Layer 3: Environment variable overrides
        Self::apply_env_overrides(&mut config)?;

        Ok(config.into())
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config)?;
        Ok(config.into())
    }

    /// Credential pair for signing API calls
    pub fn credential_pair(&self) -> Option<(&str, &str)> {
        match (&self.credentials.secret_id, &self.credentials.secret_key) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => {
                Some((id.as_str(), key.as_str()))
            }
            _ => None,
        }
    }

    /// Host name of the generation API
    pub fn endpoint_host(&self) -> &str {
        self.generation
            .endpoint
            .as_deref()
            .map(|e| e.trim_start_matches("https://").trim_end_matches('/'))
            .unwrap_or(wire::DEFAULT_HOST)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.generation.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_secs(self.generation.max_poll_interval_secs)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".kiln").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<KilnConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: KilnConfigFile = toml::from_str(&content).map_err(|e| {
            KilnError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut KilnConfigFile, overlay: KilnConfigFile) {
        if overlay.credentials.secret_id.is_some() {
            base.credentials.secret_id = overlay.credentials.secret_id;
        }
        if overlay.credentials.secret_key.is_some() {
            base.credentials.secret_key = overlay.credentials.secret_key;
        }
        if overlay.storage.bucket.is_some() {
            base.storage.bucket = overlay.storage.bucket;
        }
        if overlay.storage.region.is_some() {
            base.storage.region = overlay.storage.region;
        }

        let generation = overlay.generation;
        if generation.provider.is_some() {
            base.generation.provider = generation.provider;
        }
        if generation.poll_interval_secs.is_some() {
            base.generation.poll_interval_secs = generation.poll_interval_secs;
        }
        if generation.timeout_secs.is_some() {
            base.generation.timeout_secs = generation.timeout_secs;
        }
        if generation.max_poll_interval_secs.is_some() {
            base.generation.max_poll_interval_secs = generation.max_poll_interval_secs;
        }
        if generation.region.is_some() {
            base.generation.region = generation.region;
        }
        if generation.endpoint.is_some() {
            base.generation.endpoint = generation.endpoint;
        }
        if generation.result_format.is_some() {
            base.generation.result_format = generation.result_format;
        }
    }

    fn apply_env_overrides(config: &mut KilnConfigFile) -> Result<()> {
        if let Some(id) = env_value(TENCENT_SECRET_ID_ENV) {
            config.credentials.secret_id = Some(id);
        }
        if let Some(key) = env_value(TENCENT_SECRET_KEY_ENV) {
            config.credentials.secret_key = Some(key);
        }
        if let Some(bucket) = env_value(TENCENT_COS_BUCKET_ENV) {
            config.storage.bucket = Some(bucket);
        }
        if let Some(region) = env_value(TENCENT_COS_REGION_ENV) {
            config.storage.region = Some(region);
        }
        if let Some(provider) = env_value(KILN_PROVIDER_ENV) {
            config.generation.provider = Some(provider.parse()?);
        }
        Ok(())
    }
}

impl From<KilnConfigFile> for KilnConfig {
    fn from(file: KilnConfigFile) -> Self {
        Self {
            credentials: file.credentials,
            storage: file.storage,
            generation: file.generation.resolve(),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Names of required environment variables that are unset
pub fn missing_env_vars(include_storage: bool) -> Vec<&'static str> {
    let mut required = vec![TENCENT_SECRET_ID_ENV, TENCENT_SECRET_KEY_ENV];
    if include_storage {
        required.extend([TENCENT_COS_BUCKET_ENV, TENCENT_COS_REGION_ENV]);
    }
    required
        .into_iter()
        .filter(|var| env_value(var).is_none())
        .collect()
}

/// Setup guidance for credentials
pub fn env_help() -> String {
    format!(
        "\
Required environment variables for Hunyuan 3D:

  {id}   - Tencent Cloud SecretId
  {key}  - Tencent Cloud SecretKey

For local image uploads (--image, --left, --right, --back), also set:

  {bucket}  - COS bucket name (e.g. \"mybucket-1250000000\")
  {region}  - COS region (e.g. \"ap-guangzhou\")

Get credentials at: https://console.cloud.tencent.com/cam/capi

The same values can live in .kiln/config.toml:

  [credentials]
  secret_id = \"your-secret-id\"
  secret_key = \"your-secret-key\"

  [storage]
  bucket = \"your-bucket-name\"
  region = \"ap-guangzhou\"
",
        id = TENCENT_SECRET_ID_ENV,
        key = TENCENT_SECRET_KEY_ENV,
        bucket = TENCENT_COS_BUCKET_ENV,
        region = TENCENT_COS_REGION_ENV,
    )
}
