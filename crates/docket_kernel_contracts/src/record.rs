#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::account::AccountRecord;
use crate::complaint::ComplaintRecord;
use crate::report::ReportRecord;
use crate::{ContractViolation, Validate};

/// Every record variant the codec must round-trip losslessly. The tag makes
/// the byte encoding self-describing so historical records decode without
/// out-of-band knowledge of their stream position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainRecord {
    Account(AccountRecord),
    Complaint(ComplaintRecord),
    Report(ReportRecord),
}

impl Validate for DomainRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            Self::Account(r) => r.validate(),
            Self::Complaint(r) => r.validate(),
            Self::Report(r) => r.validate(),
        }
    }
}
