#![forbid(unsafe_code)]

use std::env;

use docket_kernel_contracts::provider_secrets::ProviderSecretId;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;

use crate::http::{build_http_agent, provider_error_from_ureq, ProviderCallError};
use crate::secret_vault;

pub mod reason_codes {
    use docket_kernel_contracts::ReasonCodeId;

    pub const PIN_OK: ReasonCodeId = ReasonCodeId(0x9141_0001);

    pub const PIN_FAIL_MISSING_CONFIG: ReasonCodeId = ReasonCodeId(0x9141_00F1);
    pub const PIN_FAIL_UPSTREAM: ReasonCodeId = ReasonCodeId(0x9141_00F2);
    pub const PIN_FAIL_MALFORMED_RESPONSE: ReasonCodeId = ReasonCodeId(0x9141_00F3);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinningConfig {
    pub pin_url: String,
    /// Base URL the content identifier is templated into for retrieval.
    pub gateway_base: String,
    /// Key pair resolved from the encrypted local secret vault when absent.
    pub api_key: Option<String>,
    pub secret_api_key: Option<String>,
    pub timeout_ms: u32,
    pub user_agent: String,
    /// Canned success body injected by tests in place of the upload.
    pub fixture_response_json: Option<String>,
}

impl PinningConfig {
    pub fn from_env() -> Self {
        Self {
            pin_url: env::var("DOCKET_PINNING_URL")
                .unwrap_or_else(|_| "https://api.pinata.cloud/pinning/pinFileToIPFS".to_string()),
            gateway_base: env::var("DOCKET_PINNING_GATEWAY")
                .unwrap_or_else(|_| "https://gateway.pinata.cloud/ipfs".to_string()),
            api_key: env::var("DOCKET_PINNING_API_KEY").ok(),
            secret_api_key: env::var("DOCKET_PINNING_SECRET_API_KEY").ok(),
            timeout_ms: env::var("DOCKET_PINNING_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| (100..=120_000).contains(v))
                .unwrap_or(20_000),
            user_agent: env::var("DOCKET_HTTP_USER_AGENT")
                .unwrap_or_else(|_| "docket-pinning/1.0".to_string()),
            fixture_response_json: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    MissingConfig,
    Upstream(ProviderCallError),
    MalformedResponse,
}

impl PinError {
    pub fn safe_detail(&self) -> String {
        match self {
            Self::MissingConfig => "provider=pinning error=missing_credentials".to_string(),
            Self::Upstream(err) => err.safe_detail(),
            Self::MalformedResponse => "provider=pinning error=malformed_response".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinReceipt {
    pub cid: String,
    pub gateway_url: String,
}

/// Uploads one file per call to the pinning collaborator over multipart
/// HTTP. ureq carries no multipart support, so the body is assembled by
/// hand with a random boundary.
#[derive(Debug, Clone)]
pub struct PinningRuntime {
    config: PinningConfig,
}

impl PinningRuntime {
    pub fn new(config: PinningConfig) -> Self {
        Self { config }
    }

    pub fn pin_file(&self, file_name: &str, bytes: &[u8]) -> Result<PinReceipt, PinError> {
        let body: Value = if let Some(fixture) = &self.config.fixture_response_json {
            serde_json::from_str(fixture).map_err(|_| PinError::MalformedResponse)?
        } else {
            let (api_key, secret_api_key) =
                self.resolve_key_pair().ok_or(PinError::MissingConfig)?;
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|_| PinError::MissingConfig)?;
            let boundary = random_boundary();
            let payload = multipart_file_body(&boundary, file_name, bytes);
            let response = agent
                .post(&self.config.pin_url)
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={boundary}"),
                )
                .set("pinata_api_key", &api_key)
                .set("pinata_secret_api_key", &secret_api_key)
                .send_bytes(&payload)
                .map_err(|e| PinError::Upstream(provider_error_from_ureq("pinning", e)))?;
            serde_json::from_reader(response.into_reader())
                .map_err(|_| PinError::MalformedResponse)?
        };

        let cid = body
            .get("IpfsHash")
            .and_then(Value::as_str)
            .filter(|cid| !cid.trim().is_empty())
            .ok_or(PinError::MalformedResponse)?;
        Ok(PinReceipt {
            cid: cid.to_string(),
            gateway_url: format!("{}/{cid}", self.config.gateway_base.trim_end_matches('/')),
        })
    }

    fn resolve_key_pair(&self) -> Option<(String, String)> {
        let api_key = self.config.api_key.clone().or_else(|| {
            secret_vault::resolve_secret(ProviderSecretId::PinningApiKey.as_str())
                .ok()
                .flatten()
        })?;
        let secret_api_key = self.config.secret_api_key.clone().or_else(|| {
            secret_vault::resolve_secret(ProviderSecretId::PinningSecretApiKey.as_str())
                .ok()
                .flatten()
        })?;
        Some((api_key, secret_api_key))
    }
}

fn random_boundary() -> String {
    let mut raw = [0u8; 16];
    OsRng.fill_bytes(&mut raw);
    let mut out = String::from("docket-boundary-");
    for b in raw {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn multipart_file_body(boundary: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
