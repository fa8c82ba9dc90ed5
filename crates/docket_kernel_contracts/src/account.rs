#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const ACCOUNT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Account identity and ledger key on the accounts stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountEmail(String);

impl AccountEmail {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "account_email",
                reason: "must not be empty",
            });
        }
        if trimmed.len() > 254 {
            return Err(ContractViolation::InvalidValue {
                field: "account_email",
                reason: "must be <= 254 chars",
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "account_email",
                reason: "must not contain whitespace",
            });
        }
        let mut parts = trimmed.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(ContractViolation::InvalidValue {
                field: "account_email",
                reason: "must be of the form local@domain.tld",
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Examiner,
    Investigator,
    Admin,
}

impl AccountRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Examiner => "examiner",
            Self::Investigator => "investigator",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "examiner" => Some(Self::Examiner),
            "investigator" => Some(Self::Investigator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Salted one-way credential digest in the form
/// `pbkdf2-sha256$<iterations>$<salt-hex>$<digest-hex>`. The plain password
/// never reaches a ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split('$');
        let scheme = parts.next().unwrap_or_default();
        let iterations = parts.next().unwrap_or_default();
        let salt = parts.next().unwrap_or_default();
        let digest = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "credential_hash",
                reason: "must have exactly four '$'-separated parts",
            });
        }
        if scheme != "pbkdf2-sha256" {
            return Err(ContractViolation::InvalidValue {
                field: "credential_hash",
                reason: "scheme must be pbkdf2-sha256",
            });
        }
        if iterations.parse::<u32>().map_or(true, |n| n == 0) {
            return Err(ContractViolation::InvalidValue {
                field: "credential_hash",
                reason: "iteration count must be a positive integer",
            });
        }
        if salt.is_empty() || !salt.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContractViolation::InvalidValue {
                field: "credential_hash",
                reason: "salt must be non-empty hex",
            });
        }
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContractViolation::InvalidValue {
                field: "credential_hash",
                reason: "digest must be 64 hex chars",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The full account value appended under the email key. Updates re-append
/// the whole record; the logical account is the latest record per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub schema_version: SchemaVersion,
    pub role: AccountRole,
    pub credential: CredentialHash,
    pub active: bool,
}

impl AccountRecord {
    pub fn v1(
        role: AccountRole,
        credential: CredentialHash,
        active: bool,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: ACCOUNT_CONTRACT_VERSION,
            role,
            credential,
            active,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for AccountRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ACCOUNT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "account_record.schema_version",
                reason: "must match ACCOUNT_CONTRACT_VERSION",
            });
        }
        CredentialHash::new(self.credential.as_str())?;
        Ok(())
    }
}

/// What authentication exposes to callers. Never carries the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub email: AccountEmail,
    pub role: AccountRole,
    pub active: bool,
}
