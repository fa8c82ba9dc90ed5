#![forbid(unsafe_code)]

use docket_engines::evidence::{EvidenceIngestRuntime, IngestCandidate};
use docket_kernel_contracts::complaint::{
    ComplaintNumber, ComplaintRecord, ComplaintView, Severity,
};
use docket_kernel_contracts::ledger::LedgerClient;
use docket_kernel_contracts::UnixTimeMs;
use docket_storage::complaint_store::{ComplaintReadResult, ComplaintStore, ComplaintStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    Validation { field: &'static str, reason: String },
    DuplicateNumber,
    Evidence { detail: String },
    Ledger { detail: String },
}

impl std::fmt::Display for IntakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, reason } => write!(f, "{field}: {reason}"),
            Self::DuplicateNumber => write!(f, "complaint number already exists"),
            Self::Evidence { detail } => write!(f, "evidence ingest failed: {detail}"),
            Self::Ledger { detail } => write!(f, "ledger failure: {detail}"),
        }
    }
}

/// Raw complaint intake fields, as decoded from the multipart surface.
#[derive(Debug, Clone, Default)]
pub struct ComplaintSubmission {
    pub number: String,
    pub title: String,
    pub date: String,
    pub place: String,
    pub details: String,
    pub evidence_details: String,
    pub category: String,
    pub severity: Option<String>,
    pub files: Vec<IngestCandidate>,
}

/// Complaint submission pipeline: validate, persist and pin evidence,
/// compose the record, append (or outbox) it.
#[derive(Debug, Clone)]
pub struct ComplaintIntakeRuntime {
    evidence: EvidenceIngestRuntime,
}

impl ComplaintIntakeRuntime {
    pub fn new(evidence: EvidenceIngestRuntime) -> Self {
        Self { evidence }
    }

    pub fn evidence(&self) -> &EvidenceIngestRuntime {
        &self.evidence
    }

    /// The returned view's `verified` flag is the availability-over-
    /// consistency signal: false means the record was accepted into the
    /// durable outbox because the chain was unavailable.
    pub fn submit<L: LedgerClient>(
        &self,
        store: &mut ComplaintStore<L>,
        now: UnixTimeMs,
        submission: ComplaintSubmission,
    ) -> Result<ComplaintView, IntakeError> {
        let number = ComplaintNumber::new(&submission.number).map_err(|violation| {
            IntakeError::Validation {
                field: "complaint_number",
                reason: violation.to_string(),
            }
        })?;
        let severity = match submission.severity.as_deref() {
            None | Some("") => Severity::default(),
            Some(raw) => Severity::parse(raw).ok_or(IntakeError::Validation {
                field: "severity",
                reason: "must be Low, Medium or High".to_string(),
            })?,
        };

        let attachments = self
            .evidence
            .ingest_batch(now, submission.files)
            .map_err(|err| IntakeError::Evidence {
                detail: err.to_string(),
            })?;

        let record = ComplaintRecord::v1(
            number,
            submission.title,
            submission.date,
            submission.place,
            submission.details,
            submission.evidence_details,
            submission.category,
            severity,
            now,
            attachments,
        )
        .map_err(|violation| IntakeError::Validation {
            field: "complaint",
            reason: violation.to_string(),
        })?;

        match store.create(now, record) {
            Ok(view) => Ok(view),
            Err(ComplaintStoreError::DuplicateNumber) => Err(IntakeError::DuplicateNumber),
            Err(other) => Err(IntakeError::Ledger {
                detail: other.to_string(),
            }),
        }
    }

    pub fn list<L: LedgerClient>(&self, store: &ComplaintStore<L>) -> ComplaintReadResult {
        store.list_all()
    }

    pub fn get<L: LedgerClient>(
        &self,
        store: &ComplaintStore<L>,
        number_raw: &str,
    ) -> Option<ComplaintView> {
        let number = ComplaintNumber::new(number_raw).ok()?;
        store.get_by_number(&number)
    }
}

#[cfg(test)]
mod tests {
    use super::{ComplaintIntakeRuntime, ComplaintSubmission, IntakeError};
    use docket_engines::evidence::{EvidenceConfig, EvidenceIngestRuntime, IngestCandidate};
    use docket_engines::pinning::{PinningConfig, PinningRuntime};
    use docket_kernel_contracts::complaint::PinState;
    use docket_kernel_contracts::ledger::StreamName;
    use docket_kernel_contracts::UnixTimeMs;
    use docket_storage::complaint_store::ComplaintStore;
    use docket_storage::memory_ledger::MemoryLedger;
    use docket_storage::outbox::DurableOutbox;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_upload_dir(name: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        std::env::temp_dir().join(format!("docket-intake-test-{name}-{suffix}"))
    }

    fn runtime(dir: &PathBuf) -> ComplaintIntakeRuntime {
        let pinning = PinningRuntime::new(PinningConfig {
            pin_url: "http://127.0.0.1:0".to_string(),
            gateway_base: "https://gateway.pinata.cloud/ipfs".to_string(),
            api_key: Some("key".to_string()),
            secret_api_key: Some("secret".to_string()),
            timeout_ms: 1_000,
            user_agent: "docket-test/1.0".to_string(),
            fixture_response_json: Some(r#"{"IpfsHash": "QmCid"}"#.to_string()),
        });
        ComplaintIntakeRuntime::new(EvidenceIngestRuntime::new(
            EvidenceConfig {
                upload_dir: dir.clone(),
            },
            pinning,
        ))
    }

    fn store() -> ComplaintStore<MemoryLedger> {
        ComplaintStore::new(
            MemoryLedger::new(),
            StreamName::new("complaints").unwrap(),
            DurableOutbox::in_memory(),
        )
    }

    fn submission(number: &str) -> ComplaintSubmission {
        ComplaintSubmission {
            number: number.to_string(),
            title: "Theft".to_string(),
            date: "2026-07-01".to_string(),
            place: "Central Market".to_string(),
            details: "A bicycle was stolen from the rack.".to_string(),
            evidence_details: String::new(),
            category: "Property".to_string(),
            severity: None,
            files: Vec::new(),
        }
    }

    #[test]
    fn at_intake_01_submission_with_files_pins_and_creates() {
        let dir = temp_upload_dir("files");
        let intake = runtime(&dir);
        let mut s = store();
        let mut sub = submission("1001");
        sub.files = vec![
            IngestCandidate {
                file_name: "rack.png".to_string(),
                bytes: b"png-bytes".to_vec(),
            },
            IngestCandidate {
                file_name: "notes.txt".to_string(),
                bytes: b"ignored".to_vec(),
            },
        ];

        let view = intake.submit(&mut s, UnixTimeMs(10), sub).unwrap();
        assert!(view.verified);
        // The text file is silently skipped; the image is pinned.
        assert_eq!(view.record.attachments.len(), 1);
        assert!(matches!(
            view.record.attachments[0].pin,
            PinState::Pinned { .. }
        ));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn at_intake_02_missing_fields_are_validation_failures() {
        let dir = temp_upload_dir("validation");
        let intake = runtime(&dir);
        let mut s = store();
        let mut sub = submission("1001");
        sub.title = String::new();
        assert!(matches!(
            intake.submit(&mut s, UnixTimeMs(10), sub),
            Err(IntakeError::Validation { .. })
        ));
        let mut sub = submission("1001");
        sub.severity = Some("catastrophic".to_string());
        assert!(matches!(
            intake.submit(&mut s, UnixTimeMs(10), sub),
            Err(IntakeError::Validation { field: "severity", .. })
        ));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn at_intake_03_duplicate_number_is_rejected() {
        let dir = temp_upload_dir("duplicate");
        let intake = runtime(&dir);
        let mut s = store();
        intake
            .submit(&mut s, UnixTimeMs(10), submission("1001"))
            .unwrap();
        assert!(matches!(
            intake.submit(&mut s, UnixTimeMs(11), submission("1001")),
            Err(IntakeError::DuplicateNumber)
        ));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn at_intake_04_chain_outage_degrades_to_unverified_success() {
        let dir = temp_upload_dir("outage");
        let intake = runtime(&dir);
        let mut s = store();
        s.ledger_mut().set_unreachable(true);

        let view = intake
            .submit(&mut s, UnixTimeMs(10), submission("1001"))
            .unwrap();
        assert!(!view.verified);
        assert_eq!(intake.list(&s).views.len(), 1);
        let _ = fs::remove_dir_all(dir);
    }
}
