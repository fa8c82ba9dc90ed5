#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::account::AccountEmail;
use crate::ledger::ReceiptId;
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const COMPLAINT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Per-submission cap on evidence files, carried from the intake surface.
pub const MAX_EVIDENCE_FILES: usize = 10;

/// Caller-supplied complaint identity and ledger key on the complaints
/// stream. Must never collide with the `report/` key namespace, so '/' is
/// rejected here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComplaintNumber(String);

impl ComplaintNumber {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_number",
                reason: "must not be empty",
            });
        }
        if trimmed.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_number",
                reason: "must be <= 64 chars",
            });
        }
        if trimmed.contains('/') {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_number",
                reason: "must not contain '/' (reserved for the report namespace)",
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_number",
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Open,
    UnderReview,
    Closed,
}

impl ComplaintStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::UnderReview => "UnderReview",
            Self::Closed => "Closed",
        }
    }
}

/// Outcome of submitting one evidence file to the pinning collaborator.
/// A failed pin is recorded, never silently dropped: the attachment stays on
/// the complaint with its digest so it can be retried or audited later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PinState {
    Pinned { cid: String, gateway_url: String },
    Failed { detail: String },
}

/// One evidence file attached to a complaint at creation; immutable after.
///
/// `digest_hex` is computed over the exact bytes persisted locally before
/// any upload, so integrity is verifiable independent of the pinning
/// service's own hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAttachment {
    pub file_name: String,
    pub stored_name: String,
    pub digest_hex: String,
    pub pin: PinState,
}

impl EvidenceAttachment {
    pub fn v1(
        file_name: String,
        stored_name: String,
        digest_hex: String,
        pin: PinState,
    ) -> Result<Self, ContractViolation> {
        let a = Self {
            file_name,
            stored_name,
            digest_hex,
            pin,
        };
        a.validate()?;
        Ok(a)
    }
}

impl Validate for EvidenceAttachment {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.file_name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "evidence_attachment.file_name",
                reason: "must not be empty",
            });
        }
        if self.stored_name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "evidence_attachment.stored_name",
                reason: "must not be empty",
            });
        }
        if self.digest_hex.len() != 64
            || !self
                .digest_hex
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ContractViolation::InvalidValue {
                field: "evidence_attachment.digest_hex",
                reason: "must be 64 lowercase hex chars (sha-256)",
            });
        }
        Ok(())
    }
}

/// Examiner annotation added after creation via full-record re-append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceNote {
    pub text: String,
    pub examiner: AccountEmail,
    pub inferred_at: UnixTimeMs,
}

impl Validate for InferenceNote {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.text.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "inference_note.text",
                reason: "must not be empty",
            });
        }
        if self.text.len() > 8192 {
            return Err(ContractViolation::InvalidValue {
                field: "inference_note.text",
                reason: "must be <= 8192 chars",
            });
        }
        Ok(())
    }
}

/// Chain publication outcome embedded in the record that reached (or missed)
/// the ledger. `verified == false` marks an outbox-resident record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfirmation {
    pub receipt: Option<ReceiptId>,
    pub verified: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub schema_version: SchemaVersion,
    pub number: ComplaintNumber,
    pub title: String,
    pub date: String,
    pub place: String,
    pub details: String,
    pub evidence_details: String,
    pub category: String,
    pub severity: Severity,
    pub status: ComplaintStatus,
    pub created_at: UnixTimeMs,
    pub attachments: Vec<EvidenceAttachment>,
    pub inference: Option<InferenceNote>,
    pub confirmation: Option<ChainConfirmation>,
}

impl ComplaintRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        number: ComplaintNumber,
        title: String,
        date: String,
        place: String,
        details: String,
        evidence_details: String,
        category: String,
        severity: Severity,
        created_at: UnixTimeMs,
        attachments: Vec<EvidenceAttachment>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: COMPLAINT_CONTRACT_VERSION,
            number,
            title,
            date,
            place,
            details,
            evidence_details,
            category,
            severity,
            status: ComplaintStatus::Open,
            created_at,
            attachments,
            inference: None,
            confirmation: None,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ComplaintRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != COMPLAINT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_record.schema_version",
                reason: "must match COMPLAINT_CONTRACT_VERSION",
            });
        }
        ComplaintNumber::new(self.number.as_str())?;
        for (field, value, max) in [
            ("complaint_record.title", &self.title, 200usize),
            ("complaint_record.date", &self.date, 40),
            ("complaint_record.place", &self.place, 200),
            ("complaint_record.details", &self.details, 8192),
            ("complaint_record.category", &self.category, 100),
        ] {
            if value.trim().is_empty() {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "must not be empty",
                });
            }
            if value.len() > max {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "exceeds field length cap",
                });
            }
        }
        if self.evidence_details.len() > 8192 {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_record.evidence_details",
                reason: "must be <= 8192 chars",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_record.created_at",
                reason: "must be > 0",
            });
        }
        if self.attachments.len() > MAX_EVIDENCE_FILES {
            return Err(ContractViolation::InvalidValue {
                field: "complaint_record.attachments",
                reason: "must hold at most 10 files",
            });
        }
        for attachment in &self.attachments {
            attachment.validate()?;
        }
        if let Some(inference) = &self.inference {
            inference.validate()?;
        }
        Ok(())
    }
}

/// A decoded complaint together with its chain provenance, as served by
/// reads. `verified == false` means the record is outbox-resident and has
/// not (yet) been confirmed by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintView {
    pub record: ComplaintRecord,
    pub receipt: Option<ReceiptId>,
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::{
        ComplaintNumber, ComplaintRecord, ComplaintStatus, EvidenceAttachment, PinState, Severity,
    };
    use crate::{UnixTimeMs, Validate};

    fn base_record() -> ComplaintRecord {
        ComplaintRecord::v1(
            ComplaintNumber::new("1001").unwrap(),
            "Theft".to_string(),
            "2026-07-01".to_string(),
            "Central Market".to_string(),
            "A bicycle was stolen from the rack.".to_string(),
            String::new(),
            "Property".to_string(),
            Severity::default(),
            UnixTimeMs(1),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn at_complaint_contract_01_new_record_opens_with_no_annotations() {
        let record = base_record();
        assert_eq!(record.status, ComplaintStatus::Open);
        assert_eq!(record.severity, Severity::Medium);
        assert!(record.attachments.is_empty());
        assert!(record.inference.is_none());
        assert!(record.confirmation.is_none());
    }

    #[test]
    fn at_complaint_contract_02_number_rejects_report_namespace() {
        assert!(ComplaintNumber::new("report/REP-1-1001").is_err());
        assert!(ComplaintNumber::new("case 1001").is_err());
        assert!(ComplaintNumber::new("1001").is_ok());
    }

    #[test]
    fn at_complaint_contract_03_attachment_digest_shape_is_enforced() {
        let good = EvidenceAttachment::v1(
            "scene.jpg".to_string(),
            "1700000000000_scene.jpg".to_string(),
            "a".repeat(64),
            PinState::Failed {
                detail: "gateway timeout".to_string(),
            },
        );
        assert!(good.is_ok());
        let bad = EvidenceAttachment::v1(
            "scene.jpg".to_string(),
            "1700000000000_scene.jpg".to_string(),
            "A".repeat(64),
            PinState::Failed {
                detail: "gateway timeout".to_string(),
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn at_complaint_contract_04_attachment_cap_is_enforced() {
        let mut record = base_record();
        record.attachments = (0..11)
            .map(|i| EvidenceAttachment {
                file_name: format!("f{i}.png"),
                stored_name: format!("1_{i}.png"),
                digest_hex: "b".repeat(64),
                pin: PinState::Failed {
                    detail: "x".to_string(),
                },
            })
            .collect();
        assert!(record.validate().is_err());
    }
}
