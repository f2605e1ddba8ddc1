//! Input image uploads to Tencent Cloud Object Storage
//!
//! The generation service only accepts image URLs, so local images are PUT
//! into a COS bucket first and handed over as short-lived signed links.

use crate::config::{self, KilnConfig};
use hmac::{Hmac, Mac};
use kiln_core::{KilnError, Result};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;

type HmacSha1 = Hmac<Sha1>;

const KEY_PREFIX: &str = "kiln";
const UPLOAD_TIMEOUT_SECS: u64 = 120;
/// Lifetime of the signed GET link handed to the generation service
const URL_VALIDITY_SECS: i64 = 3600;
/// Lifetime of the PUT signature
const PUT_VALIDITY_SECS: i64 = 600;

/// Makes a local file reachable by URL
pub trait AssetUploader {
    /// Upload `path` and return a URL the generation service can fetch
    fn upload_file(&self, path: &Path) -> Result<String>;
}

/// Computes COS `q-sign-algorithm=sha1` signatures
#[derive(Debug, Clone)]
pub struct CosSigner {
    secret_id: String,
    secret_key: String,
}

impl CosSigner {
    pub fn new(secret_id: &str, secret_key: &str) -> Self {
        Self {
            secret_id: secret_id.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Signature string for `method path` on `host`, valid from `start` to `end`
    pub fn sign(&self, method: &str, path: &str, host: &str, start: i64, end: i64) -> String {
        let key_time = format!("{};{}", start, end);
        let http_string = format!("{}\n{}\n\nhost={}\n", method.to_lowercase(), path, host);
        let string_to_sign = format!(
            "sha1\n{}\n{}\n",
            key_time,
            hex::encode(Sha1::digest(http_string.as_bytes()))
        );

        let sign_key = hex::encode(hmac_sha1(self.secret_key.as_bytes(), key_time.as_bytes()));
        let signature = hex::encode(hmac_sha1(sign_key.as_bytes(), string_to_sign.as_bytes()));

        format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={kt}&q-key-time={kt}\
             &q-header-list=host&q-url-param-list=&q-signature={}",
            self.secret_id,
            signature,
            kt = key_time
        )
    }
}

/// Uploads to `https://{bucket}.cos.{region}.myqcloud.com/kiln/`
pub struct CosUploader {
    signer: CosSigner,
    host: String,
    agent: ureq::Agent,
}

impl CosUploader {
    pub fn new(secret_id: &str, secret_key: &str, bucket: &str, region: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(UPLOAD_TIMEOUT_SECS)))
            .build();
        Self {
            signer: CosSigner::new(secret_id, secret_key),
            host: format!("{}.cos.{}.myqcloud.com", bucket, region),
            agent: config.into(),
        }
    }

    /// Create an uploader from config, naming every missing setting on failure
    pub fn from_config(config: &KilnConfig) -> Result<Self> {
        let mut missing = Vec::new();
        let credentials = config.credential_pair();
        if credentials.is_none() {
            missing.extend([config::TENCENT_SECRET_ID_ENV, config::TENCENT_SECRET_KEY_ENV]);
        }
        let bucket = non_empty(config.storage.bucket.as_deref());
        if bucket.is_none() {
            missing.push(config::TENCENT_COS_BUCKET_ENV);
        }
        let region = non_empty(config.storage.region.as_deref());
        if region.is_none() {
            missing.push(config::TENCENT_COS_REGION_ENV);
        }

        match (credentials, bucket, region) {
            (Some((id, key)), Some(bucket), Some(region)) => {
                Ok(Self::new(id, key, bucket, region))
            }
            _ => Err(KilnError::Upload(format!(
                "COS storage not configured for local image uploads. Missing: {}",
                missing.join(", ")
            ))),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Pre-signed GET URL for `object_path`, valid from `now` for one hour
    pub fn presigned_url(&self, object_path: &str, now: i64) -> String {
        let auth = self
            .signer
            .sign("get", object_path, &self.host, now, now + URL_VALIDITY_SECS);
        format!(
            "https://{}{}?{}",
            self.host,
            object_path,
            auth.replace(';', "%3B")
        )
    }
}

impl AssetUploader for CosUploader {
    fn upload_file(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(KilnError::Upload(format!(
                "Image not found: {}",
                path.display()
            )));
        }
        let bytes = std::fs::read(path)?;
        let object_path = object_path_for(path);
        let now = chrono::Utc::now().timestamp();
        let authorization = self
            .signer
            .sign("put", &object_path, &self.host, now, now + PUT_VALIDITY_SECS);

        let url = format!("https://{}{}", self.host, object_path);
        self.agent
            .put(&url)
            .header("Authorization", &authorization)
            .header("Content-Type", content_type_for(path))
            .send(&bytes[..])
            .map_err(|e| KilnError::Upload(format!("PUT {} failed: {}", url, e)))?;

        tracing::info!(
            file = %path.display(),
            bytes = bytes.len(),
            object = %object_path,
            "uploaded image"
        );
        Ok(self.presigned_url(&object_path, now))
    }
}

/// Create the uploader for runs that need one
pub fn create_uploader(config: &KilnConfig) -> Result<Box<dyn AssetUploader>> {
    Ok(Box::new(CosUploader::from_config(config)?))
}

/// Unique object path keeping the file's extension
fn object_path_for(path: &Path) -> String {
    let id = uuid::Uuid::new_v4();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("/{}/{}.{}", KEY_PREFIX, id, ext.to_lowercase()),
        None => format!("/{}/{}", KEY_PREFIX, id),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
