#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::account::AccountEmail;
use crate::complaint::ComplaintNumber;
use crate::ledger::RecordKey;
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const REPORT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Ledger key prefix keeping report keys disjoint from complaint numbers,
/// which reject '/' at validation.
pub const REPORT_KEY_PREFIX: &str = "report/";

/// Synthesized report identity: `REP-<unix-ms>-<complaint-number>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(String);

impl ReportId {
    pub fn derive(generated_at: UnixTimeMs, number: &ComplaintNumber) -> Self {
        Self(format!("REP-{}-{}", generated_at.0, number.as_str()))
    }

    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if !trimmed.starts_with("REP-") || trimmed.len() <= 4 {
            return Err(ContractViolation::InvalidValue {
                field: "report_id",
                reason: "must be of the form REP-<unix-ms>-<complaint-number>",
            });
        }
        if trimmed.len() > 128 || trimmed.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "report_id",
                reason: "must be <= 128 chars without whitespace",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// AI-generated case report. A new logical entity on the complaints stream,
/// never a mutation of the complaint record it derives from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub schema_version: SchemaVersion,
    pub report_id: ReportId,
    pub complaint_number: ComplaintNumber,
    pub complaint_title: String,
    pub prose: String,
    pub examiner: Option<AccountEmail>,
    pub inference_echo: Option<String>,
    pub generated_at: UnixTimeMs,
}

impl ReportRecord {
    pub fn v1(
        complaint_number: ComplaintNumber,
        complaint_title: String,
        prose: String,
        examiner: Option<AccountEmail>,
        inference_echo: Option<String>,
        generated_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: REPORT_CONTRACT_VERSION,
            report_id: ReportId::derive(generated_at, &complaint_number),
            complaint_number,
            complaint_title,
            prose,
            examiner,
            inference_echo,
            generated_at,
        };
        r.validate()?;
        Ok(r)
    }

    /// The key this report is appended under: `report/<report-id>`.
    pub fn ledger_key(&self) -> Result<RecordKey, ContractViolation> {
        RecordKey::new(&format!("{REPORT_KEY_PREFIX}{}", self.report_id.as_str()))
    }
}

impl Validate for ReportRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != REPORT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "report_record.schema_version",
                reason: "must match REPORT_CONTRACT_VERSION",
            });
        }
        ReportId::new(self.report_id.as_str())?;
        ComplaintNumber::new(self.complaint_number.as_str())?;
        if self.prose.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "report_record.prose",
                reason: "must not be empty",
            });
        }
        if self.generated_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "report_record.generated_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
