#![forbid(unsafe_code)]

use std::time::Duration;

/// Transport/application failure from one upstream collaborator call. The
/// detail string is safe to log: provider name, error kind and HTTP status
/// only, never payloads or credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallError {
    pub provider: &'static str,
    pub http_status: Option<u16>,
    pub error_kind: &'static str,
}

impl ProviderCallError {
    pub fn new(provider: &'static str, error_kind: &'static str, http_status: Option<u16>) -> Self {
        Self {
            provider,
            http_status,
            error_kind,
        }
    }

    pub fn safe_detail(&self) -> String {
        match self.http_status {
            Some(status) => format!(
                "provider={} error={} status={}",
                self.provider, self.error_kind, status
            ),
            None => format!("provider={} error={}", self.provider, self.error_kind),
        }
    }

    /// True when the upstream answered (a non-2xx status); false for pure
    /// transport failures where nothing is known to have happened.
    pub fn is_upstream_rejection(&self) -> bool {
        self.http_status.is_some()
    }
}

pub fn build_http_agent(timeout_ms: u32, user_agent: &str) -> Result<ureq::Agent, String> {
    if timeout_ms == 0 {
        return Err("timeout must be > 0".to_string());
    }
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    Ok(ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build())
}

pub fn provider_error_from_ureq(provider: &'static str, err: ureq::Error) -> ProviderCallError {
    match err {
        ureq::Error::Status(status, _) => {
            ProviderCallError::new(provider, "http_non_200", Some(status as u16))
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            ProviderCallError::new(provider, classify_transport_error_kind(&combined), None)
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
