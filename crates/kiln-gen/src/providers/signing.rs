//! TC3-HMAC-SHA256 request signing for Tencent Cloud API v3

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

/// Signs JSON POST requests for one service endpoint
#[derive(Debug, Clone)]
pub struct Tc3Signer {
    secret_id: String,
    secret_key: String,
    service: String,
    host: String,
}

impl Tc3Signer {
    pub fn new(secret_id: &str, secret_key: &str, service: &str, host: &str) -> Self {
        Self {
            secret_id: secret_id.to_string(),
            secret_key: secret_key.to_string(),
            service: service.to_string(),
            host: host.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build the `Authorization` header value for `payload` sent at `timestamp`
    pub fn authorization(&self, payload: &str, timestamp: i64) -> String {
        let date = utc_date(timestamp);
        let scope = format!("{}/{}/tc3_request", date, self.service);

        let canonical_request = format!(
            "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
            CONTENT_TYPE,
            self.host,
            SIGNED_HEADERS,
            sha256_hex(payload.as_bytes())
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            timestamp,
            scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let secret_date = hmac_sha256(format!("TC3{}", self.secret_key).as_bytes(), date.as_bytes());
        let secret_service = hmac_sha256(&secret_date, self.service.as_bytes());
        let secret_signing = hmac_sha256(&secret_service, b"tc3_request");
        let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes()));

        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.secret_id, scope, SIGNED_HEADERS, signature
        )
    }

    /// All headers for an API call, in the order they should be sent
    pub fn headers(
        &self,
        action: &str,
        version: &str,
        region: &str,
        payload: &str,
        timestamp: i64,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", self.authorization(payload, timestamp)),
            ("Content-Type", CONTENT_TYPE.to_string()),
            ("Host", self.host.clone()),
            ("X-TC-Action", action.to_string()),
            ("X-TC-Timestamp", timestamp.to_string()),
            ("X-TC-Version", version.to_string()),
            ("X-TC-Region", region.to_string()),
        ]
    }
}

fn utc_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Tc3Signer {
        Tc3Signer::new(
            "AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE",
            "Gu5t9xGARNpq86cd98joQYCN3EXAMPLE",
            "cvm",
            "cvm.tencentcloudapi.com",
        )
    }

    #[test]
    fn test_authorization_known_answer() {
        let payload = r#"{"Limit": 1, "Filters": [{"Values": ["未命名"], "Name": "instance-name"}]}"#;
        let auth = signer().authorization(payload, 1551113065);
        assert_eq!(
            auth,
            "TC3-HMAC-SHA256 Credential=AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE/2019-02-25/cvm/tc3_request, \
             SignedHeaders=content-type;host, \
             Signature=57ed31a395c63c472410096cc67e56aa39aa2b06b960d4f31beea21236106ca9"
        );
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let s = signer();
        assert_ne!(s.authorization("{}", 1551113065), s.authorization("{\"a\":1}", 1551113065));
    }

    #[test]
    fn test_headers_carry_action_and_timestamp() {
        let headers = signer().headers("DescribeInstances", "2017-03-12", "ap-guangzhou", "{}", 1551113065);
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("X-TC-Action"), "DescribeInstances");
        assert_eq!(get("X-TC-Timestamp"), "1551113065");
        assert_eq!(get("X-TC-Region"), "ap-guangzhou");
        assert_eq!(get("Host"), "cvm.tencentcloudapi.com");
        assert!(get("Authorization").starts_with("TC3-HMAC-SHA256 Credential="));
    }

    #[test]
    fn test_utc_date() {
        assert_eq!(utc_date(0), "1970-01-01");
        assert_eq!(utc_date(1551113065), "2019-02-25");
    }
}
