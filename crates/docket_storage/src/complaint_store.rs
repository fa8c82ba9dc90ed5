#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use docket_kernel_contracts::account::AccountEmail;
use docket_kernel_contracts::complaint::{
    ChainConfirmation, ComplaintNumber, ComplaintRecord, ComplaintView, InferenceNote,
};
use docket_kernel_contracts::ledger::{LedgerClient, LedgerError, ReceiptId, RecordKey, StreamName};
use docket_kernel_contracts::record::DomainRecord;
use docket_kernel_contracts::report::ReportRecord;
use docket_kernel_contracts::{ContractViolation, UnixTimeMs, Validate};

use crate::codec;
use crate::outbox::{DurableOutbox, OutboxError, OutboxReconcilePassMetrics};

#[derive(Debug)]
pub enum ComplaintStoreError {
    DuplicateNumber,
    NotFound,
    Ledger(LedgerError),
    Contract(ContractViolation),
    Codec(codec::CodecError),
    Outbox(OutboxError),
}

impl std::fmt::Display for ComplaintStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNumber => write!(f, "complaint number already exists"),
            Self::NotFound => write!(f, "complaint not found"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Contract(violation) => write!(f, "{violation}"),
            Self::Codec(err) => write!(f, "{err}"),
            Self::Outbox(err) => write!(f, "{err}"),
        }
    }
}

impl From<LedgerError> for ComplaintStoreError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<ContractViolation> for ComplaintStoreError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

impl From<codec::CodecError> for ComplaintStoreError {
    fn from(value: codec::CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<OutboxError> for ComplaintStoreError {
    fn from(value: OutboxError) -> Self {
        Self::Outbox(value)
    }
}

/// A batch read over the complaints stream. `views` is ledger append order
/// followed by outbox-only records; `skipped_records` counts physical
/// records that failed to decode and were skipped (never fatal).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComplaintReadResult {
    pub views: Vec<ComplaintView>,
    pub skipped_records: u32,
}

/// Complaints (and report records) as append-only records on the complaints
/// stream. "Updates" decode the latest record, mutate in memory and
/// re-append the full record under the same number; reads surface the whole
/// append history, leaving last-per-number reduction to callers.
#[derive(Debug)]
pub struct ComplaintStore<L: LedgerClient> {
    ledger: L,
    stream: StreamName,
    outbox: DurableOutbox,
}

impl<L: LedgerClient> ComplaintStore<L> {
    pub fn new(ledger: L, stream: StreamName, outbox: DurableOutbox) -> Self {
        Self {
            ledger,
            stream,
            outbox,
        }
    }

    pub fn outbox(&self) -> &DurableOutbox {
        &self.outbox
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Every complaint record in ledger append order, each carrying its
    /// receipt, merged with outbox-only records (served unverified, ledger
    /// wins on number collision). Report-namespace records are not
    /// complaints and are filtered out. Ledger failure degrades to
    /// outbox-backed results, never an error.
    pub fn list_all(&self) -> ComplaintReadResult {
        let mut result = ComplaintReadResult::default();
        let mut ledger_numbers: BTreeSet<ComplaintNumber> = BTreeSet::new();

        if let Ok(entries) = self.ledger.list_all(&self.stream) {
            for entry in entries {
                match codec::decode(&entry.bytes) {
                    Ok(DomainRecord::Complaint(record)) => {
                        ledger_numbers.insert(record.number.clone());
                        result.views.push(ComplaintView {
                            record,
                            receipt: Some(entry.receipt),
                            verified: true,
                        });
                    }
                    Ok(_) => {}
                    Err(_) => result.skipped_records += 1,
                }
            }
        }

        for entry in self.outbox.entries() {
            if ledger_numbers.contains(&entry.record.number) {
                continue;
            }
            result.views.push(ComplaintView {
                record: entry.record.clone(),
                receipt: None,
                verified: false,
            });
        }
        result
    }

    /// The most recently appended version for a number, preferring ledger
    /// state over the outbox.
    pub fn get_by_number(&self, number: &ComplaintNumber) -> Option<ComplaintView> {
        if let Some(view) = self.latest_ledger_view(number) {
            return Some(view);
        }
        self.outbox
            .entries()
            .iter()
            .rev()
            .find(|entry| entry.record.number == *number)
            .map(|entry| ComplaintView {
                record: entry.record.clone(),
                receipt: None,
                verified: false,
            })
    }

    /// Appends a new complaint. Uniqueness is checked against the union of
    /// every physical ledger record (stale versions included) and every
    /// outbox entry. A failed chain append is downgraded to a soft success:
    /// the record lands in the durable outbox and the returned view says
    /// `verified == false` with the failure detail in its confirmation.
    pub fn create(
        &mut self,
        now: UnixTimeMs,
        record: ComplaintRecord,
    ) -> Result<ComplaintView, ComplaintStoreError> {
        let key = RecordKey::new(record.number.as_str())?;
        match self.ledger.list_by_key(&self.stream, &key) {
            Ok(entries) if !entries.is_empty() => {
                return Err(ComplaintStoreError::DuplicateNumber)
            }
            // An unreachable ledger cannot veto creation; the append below
            // (or the outbox) decides the record's fate.
            Ok(_) | Err(_) => {}
        }
        if self.outbox.contains_number(&record.number) {
            return Err(ComplaintStoreError::DuplicateNumber);
        }

        let bytes = codec::encode(&DomainRecord::Complaint(record.clone()))?;
        match self.ledger.append(&self.stream, &key, &bytes) {
            Ok(receipt) => Ok(ComplaintView {
                record,
                receipt: Some(receipt),
                verified: true,
            }),
            Err(err) => {
                let mut unverified = record;
                unverified.confirmation = Some(ChainConfirmation {
                    receipt: None,
                    verified: false,
                    detail: Some(err.safe_detail().to_string()),
                });
                self.outbox.push(unverified.clone(), now)?;
                Ok(ComplaintView {
                    record: unverified,
                    receipt: None,
                    verified: false,
                })
            }
        }
    }

    /// Decode-latest, set the inference fields, re-append the full record
    /// under the same number. Operates on ledger state only: annotating an
    /// outbox-resident record would race its reconciliation.
    pub fn add_inference(
        &mut self,
        now: UnixTimeMs,
        number: &ComplaintNumber,
        text: String,
        examiner: AccountEmail,
    ) -> Result<ComplaintView, ComplaintStoreError> {
        let current = self
            .latest_ledger_view(number)
            .ok_or(ComplaintStoreError::NotFound)?;
        let mut updated = current.record;
        updated.inference = Some(InferenceNote {
            text,
            examiner,
            inferred_at: now,
        });
        updated.validate()?;
        let key = RecordKey::new(number.as_str())?;
        let bytes = codec::encode(&DomainRecord::Complaint(updated.clone()))?;
        let receipt = self.ledger.append(&self.stream, &key, &bytes)?;
        Ok(ComplaintView {
            record: updated,
            receipt: Some(receipt),
            verified: true,
        })
    }

    /// Appends a report as a new record under the `report/` key namespace,
    /// never mutating the complaint it derives from.
    pub fn attach_report(
        &mut self,
        report: &ReportRecord,
    ) -> Result<ReceiptId, ComplaintStoreError> {
        let key = report.ledger_key()?;
        let bytes = codec::encode(&DomainRecord::Report(report.clone()))?;
        Ok(self.ledger.append(&self.stream, &key, &bytes)?)
    }

    /// One reconciler pass over the outbox against this store's ledger.
    pub fn reconcile_outbox(&mut self) -> OutboxReconcilePassMetrics {
        self.outbox.reconcile_pass(&mut self.ledger, &self.stream)
    }

    fn latest_ledger_view(&self, number: &ComplaintNumber) -> Option<ComplaintView> {
        let key = RecordKey::new(number.as_str()).ok()?;
        let entries = self.ledger.list_by_key(&self.stream, &key).ok()?;
        entries
            .iter()
            .rev()
            .find_map(|entry| match codec::decode(&entry.bytes) {
                Ok(DomainRecord::Complaint(record)) => Some(ComplaintView {
                    record,
                    receipt: Some(entry.receipt.clone()),
                    verified: true,
                }),
                _ => None,
            })
    }
}
