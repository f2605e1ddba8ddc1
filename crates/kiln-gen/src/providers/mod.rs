//! Provider registry
//!
//! Maps provider kinds to concrete transports.

pub mod http;
pub mod sdk;
pub mod signing;
pub mod wire;

use crate::config::{self, KilnConfig};
use crate::provider::{JobProvider, ProviderKind};
use kiln_core::{KilnError, Result};
use signing::Tc3Signer;

/// Create the provider selected for this run
pub fn create_provider(kind: ProviderKind, config: &KilnConfig) -> Result<Box<dyn JobProvider>> {
    match kind {
        ProviderKind::Http => Ok(Box::new(http::HttpProvider::from_config(config)?)),
        ProviderKind::Sdk => sdk::create(config),
    }
}

/// All provider kinds with whether each is usable in this build
pub fn available_providers() -> Vec<(ProviderKind, bool)> {
    ProviderKind::ALL
        .iter()
        .map(|kind| {
            let available = match kind {
                ProviderKind::Http => true,
                ProviderKind::Sdk => is_sdk_available(),
            };
            (*kind, available)
        })
        .collect()
}

/// Whether the SDK transport was compiled in
pub fn is_sdk_available() -> bool {
    cfg!(feature = "sdk")
}

pub fn sdk_install_instructions() -> String {
    "The sdk provider is not compiled into this build.\n\
     Rebuild with: cargo install --path crates/kiln-cli --features sdk\n\
     Or use the default provider: --provider http"
        .to_string()
}

/// Endpoint settings shared by both transports
#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub signer: Tc3Signer,
    pub region: String,
    pub result_format: String,
}

impl ApiSettings {
    pub fn from_config(config: &KilnConfig) -> Result<Self> {
        let (secret_id, secret_key) = config.credential_pair().ok_or_else(|| {
            KilnError::Config(format!(
                "Tencent Cloud credentials not configured. Set {} and {} or add them to .kiln/config.toml",
                config::TENCENT_SECRET_ID_ENV,
                config::TENCENT_SECRET_KEY_ENV
            ))
        })?;

        Ok(Self {
            signer: Tc3Signer::new(secret_id, secret_key, wire::SERVICE, config.endpoint_host()),
            region: config.generation.region.clone(),
            result_format: config.generation.result_format.clone(),
        })
    }

    pub fn url(&self) -> String {
        format!("https://{}", self.signer.host())
    }

    /// Signed headers for one call made now
    pub fn headers(&self, action: &str, payload: &str) -> Vec<(&'static str, String)> {
        let timestamp = chrono::Utc::now().timestamp();
        self.signer
            .headers(action, wire::API_VERSION, &self.region, payload, timestamp)
    }
}
