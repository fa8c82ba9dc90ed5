#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderSecretId {
    ChainRpcPassword,
    PinningApiKey,
    PinningSecretApiKey,
    ReportApiKey,
}

impl ProviderSecretId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChainRpcPassword => "chain_rpc_password",
            Self::PinningApiKey => "pinning_api_key",
            Self::PinningSecretApiKey => "pinning_secret_api_key",
            Self::ReportApiKey => "report_api_key",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::ChainRpcPassword,
            Self::PinningApiKey,
            Self::PinningSecretApiKey,
            Self::ReportApiKey,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "chain_rpc_password" => Some(Self::ChainRpcPassword),
            "pinning_api_key" => Some(Self::PinningApiKey),
            "pinning_secret_api_key" => Some(Self::PinningSecretApiKey),
            "report_api_key" => Some(Self::ReportApiKey),
            _ => None,
        }
    }

    pub fn allowed_key_names() -> Vec<&'static str> {
        Self::all().iter().map(|id| id.as_str()).collect()
    }
}
