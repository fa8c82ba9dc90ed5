#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, Validate};

/// A named partition on the external chain holding related keyed records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamName(String);

impl StreamName {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "stream_name",
                reason: "must not be empty",
            });
        }
        if trimmed.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "stream_name",
                reason: "must be <= 64 chars",
            });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ContractViolation::InvalidValue {
                field: "stream_name",
                reason: "must be ascii alphanumeric, '_' or '-'",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The key a record is appended under. Account emails and complaint numbers
/// are keys; report records use the `report/` prefix to keep their namespace
/// disjoint from complaint numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "record_key",
                reason: "must not be empty",
            });
        }
        if trimmed.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "record_key",
                reason: "must be <= 256 chars",
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "record_key",
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The chain's acknowledgment identifier for a committed append (a txid in
/// the original deployment). Used as an audit/verification reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReceiptId(String);

impl ReceiptId {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "receipt_id",
                reason: "must not be empty",
            });
        }
        if trimmed.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "receipt_id",
                reason: "must be <= 128 chars",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One physical record as read back from a stream, in append order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub key: RecordKey,
    pub bytes: Vec<u8>,
    pub receipt: ReceiptId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport-level failure: the chain endpoint could not be reached or
    /// did not answer. A failed append means "unknown", not "absent".
    Unreachable { detail: String },
    /// The chain answered and rejected the request; carries its error detail.
    Rejected { detail: String },
}

impl LedgerError {
    pub fn safe_detail(&self) -> &str {
        match self {
            Self::Unreachable { detail } | Self::Rejected { detail } => detail.as_str(),
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable { detail } => write!(f, "ledger unreachable: {detail}"),
            Self::Rejected { detail } => write!(f, "ledger rejected: {detail}"),
        }
    }
}

/// Narrow interface over the external append-only chain.
///
/// `append` is not exactly-once: callers must treat a failed append as
/// "unknown" and never assume the absence of a committed side effect. Reads
/// return records in append order, oldest first; the latest element per key
/// is authoritative for "current" semantics. There is no transactional
/// guarantee across keys and no conditional append, so concurrent
/// read-modify-append sequences to one key are last-writer-wins.
pub trait LedgerClient {
    fn append(
        &mut self,
        stream: &StreamName,
        key: &RecordKey,
        bytes: &[u8],
    ) -> Result<ReceiptId, LedgerError>;

    fn list_by_key(
        &self,
        stream: &StreamName,
        key: &RecordKey,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    fn list_all(&self, stream: &StreamName) -> Result<Vec<LedgerEntry>, LedgerError>;
}

impl Validate for RecordKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        Self::new(&self.0).map(|_| ())
    }
}
