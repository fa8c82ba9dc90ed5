#![forbid(unsafe_code)]

use docket_engines::report_gen::ReportGenRuntime;
use docket_kernel_contracts::account::AccountEmail;
use docket_kernel_contracts::complaint::{ComplaintNumber, ComplaintView};
use docket_kernel_contracts::ledger::{LedgerClient, ReceiptId};
use docket_kernel_contracts::report::ReportRecord;
use docket_kernel_contracts::UnixTimeMs;
use docket_storage::complaint_store::{ComplaintStore, ComplaintStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseworkError {
    Validation { field: &'static str, reason: String },
    NotFound,
    Ledger { detail: String },
    ReportGen { detail: String },
}

impl std::fmt::Display for CaseworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, reason } => write!(f, "{field}: {reason}"),
            Self::NotFound => write!(f, "complaint not found"),
            Self::Ledger { detail } => write!(f, "ledger failure: {detail}"),
            Self::ReportGen { detail } => write!(f, "report generation failed: {detail}"),
        }
    }
}

/// A generated report together with its chain provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReport {
    pub record: ReportRecord,
    pub receipt: ReceiptId,
}

/// Post-creation casework: examiner annotations and AI-generated reports.
#[derive(Debug, Clone)]
pub struct CaseworkRuntime {
    report_gen: ReportGenRuntime,
}

impl CaseworkRuntime {
    pub fn new(report_gen: ReportGenRuntime) -> Self {
        Self { report_gen }
    }

    /// Decode-latest, annotate, re-append under the same complaint number.
    pub fn add_inference<L: LedgerClient>(
        &self,
        store: &mut ComplaintStore<L>,
        now: UnixTimeMs,
        number_raw: &str,
        inference_text: &str,
        examiner_raw: &str,
    ) -> Result<ComplaintView, CaseworkError> {
        let number =
            ComplaintNumber::new(number_raw).map_err(|violation| CaseworkError::Validation {
                field: "complaint_number",
                reason: violation.to_string(),
            })?;
        let examiner =
            AccountEmail::new(examiner_raw).map_err(|violation| CaseworkError::Validation {
                field: "examiner",
                reason: violation.to_string(),
            })?;
        if inference_text.trim().is_empty() {
            return Err(CaseworkError::Validation {
                field: "inference",
                reason: "must not be empty".to_string(),
            });
        }
        store
            .add_inference(now, &number, inference_text.to_string(), examiner)
            .map_err(map_store_error)
    }

    /// Fetches the complaint's current view, asks the report collaborator
    /// for prose and appends the result as a new record under the report
    /// key namespace. One synchronous call; no retry.
    pub fn generate_report<L: LedgerClient>(
        &self,
        store: &mut ComplaintStore<L>,
        now: UnixTimeMs,
        number_raw: &str,
    ) -> Result<GeneratedReport, CaseworkError> {
        let number =
            ComplaintNumber::new(number_raw).map_err(|violation| CaseworkError::Validation {
                field: "complaint_number",
                reason: violation.to_string(),
            })?;
        let current = store.get_by_number(&number).ok_or(CaseworkError::NotFound)?;

        let prose =
            self.report_gen
                .generate(&current.record)
                .map_err(|err| CaseworkError::ReportGen {
                    detail: err.safe_detail(),
                })?;

        let record = ReportRecord::v1(
            number,
            current.record.title.clone(),
            prose,
            current.record.inference.as_ref().map(|n| n.examiner.clone()),
            current.record.inference.as_ref().map(|n| n.text.clone()),
            now,
        )
        .map_err(|violation| CaseworkError::Validation {
            field: "report",
            reason: violation.to_string(),
        })?;

        let receipt = store.attach_report(&record).map_err(map_store_error)?;
        Ok(GeneratedReport { record, receipt })
    }
}

fn map_store_error(err: ComplaintStoreError) -> CaseworkError {
    match err {
        ComplaintStoreError::NotFound => CaseworkError::NotFound,
        ComplaintStoreError::DuplicateNumber => CaseworkError::Ledger {
            detail: "unexpected duplicate on re-append".to_string(),
        },
        other => CaseworkError::Ledger {
            detail: other.to_string(),
        },
    }
}
