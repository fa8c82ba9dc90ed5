#![forbid(unsafe_code)]

use docket_kernel_contracts::account::AccountEmail;
use docket_kernel_contracts::complaint::{
    ComplaintNumber, ComplaintRecord, ComplaintStatus, Severity,
};
use docket_kernel_contracts::ledger::{LedgerClient, RecordKey, StreamName};
use docket_kernel_contracts::report::ReportRecord;
use docket_kernel_contracts::UnixTimeMs;
use docket_storage::complaint_store::{ComplaintStore, ComplaintStoreError};
use docket_storage::memory_ledger::MemoryLedger;
use docket_storage::outbox::DurableOutbox;

fn stream() -> StreamName {
    StreamName::new("complaints").unwrap()
}

fn store() -> ComplaintStore<MemoryLedger> {
    ComplaintStore::new(MemoryLedger::new(), stream(), DurableOutbox::in_memory())
}

fn record(number: &str, title: &str, category: &str) -> ComplaintRecord {
    ComplaintRecord::v1(
        ComplaintNumber::new(number).unwrap(),
        title.to_string(),
        "2026-07-01".to_string(),
        "Central Market".to_string(),
        "Detailed description of the incident.".to_string(),
        String::new(),
        category.to_string(),
        Severity::default(),
        UnixTimeMs(1_700_000_000_000),
        Vec::new(),
    )
    .unwrap()
}

#[test]
fn at_complaints_01_create_scenario_opens_with_no_files() {
    let mut s = store();
    let view = s
        .create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();

    assert!(view.verified);
    assert!(view.receipt.is_some());
    assert_eq!(view.record.status, ComplaintStatus::Open);
    assert!(view.record.attachments.is_empty());

    let second = s.create(UnixTimeMs(11), record("1001", "Theft", "Property"));
    assert!(matches!(second, Err(ComplaintStoreError::DuplicateNumber)));
}

#[test]
fn at_complaints_02_get_by_number_returns_latest_append() {
    let mut s = store();
    s.create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();
    let annotated = s
        .add_inference(
            UnixTimeMs(20),
            &ComplaintNumber::new("1001").unwrap(),
            "Matches a known pattern of rack thefts.".to_string(),
            AccountEmail::new("examiner@agency.example").unwrap(),
        )
        .unwrap();
    assert!(annotated.record.inference.is_some());

    let current = s
        .get_by_number(&ComplaintNumber::new("1001").unwrap())
        .unwrap();
    let note = current.record.inference.expect("latest version wins");
    assert_eq!(note.inferred_at, UnixTimeMs(20));
    assert_eq!(note.examiner.as_str(), "examiner@agency.example");
    // The physical history keeps both versions.
    assert_eq!(s.list_all().views.len(), 2);
}

#[test]
fn at_complaints_03_add_inference_on_unknown_number_is_not_found() {
    let mut s = store();
    let missing = s.add_inference(
        UnixTimeMs(20),
        &ComplaintNumber::new("9999").unwrap(),
        "No such case.".to_string(),
        AccountEmail::new("examiner@agency.example").unwrap(),
    );
    assert!(matches!(missing, Err(ComplaintStoreError::NotFound)));
}

#[test]
fn at_complaints_04_malformed_records_are_skipped_not_fatal() {
    let mut s = store();
    s.create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();
    // A corrupted historical record lands between two good ones.
    s.ledger_mut()
        .append(
            &stream(),
            &RecordKey::new("garbled").unwrap(),
            b"not-hex-at-all",
        )
        .unwrap();
    s.create(UnixTimeMs(11), record("1002", "Arson", "Property"))
        .unwrap();

    let result = s.list_all();
    assert_eq!(result.views.len(), 2);
    assert_eq!(result.skipped_records, 1);
}

#[test]
fn at_complaints_05_unreachable_ledger_degrades_to_soft_success() {
    let mut s = store();
    s.ledger_mut().set_unreachable(true);

    let view = s
        .create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();
    assert!(!view.verified);
    assert!(view.receipt.is_none());
    let confirmation = view.record.confirmation.expect("failure must be signaled");
    assert!(!confirmation.verified);
    assert!(confirmation.detail.is_some());

    // Reads keep serving the record from the outbox while the chain is down.
    let listed = s.list_all();
    assert_eq!(listed.views.len(), 1);
    assert!(!listed.views[0].verified);
    let fetched = s
        .get_by_number(&ComplaintNumber::new("1001").unwrap())
        .unwrap();
    assert!(!fetched.verified);
}

#[test]
fn at_complaints_06_uniqueness_holds_against_outbox_only_records() {
    let mut s = store();
    s.ledger_mut().set_unreachable(true);
    s.create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();

    // Chain recovers, but the first "1001" still only exists in the outbox.
    s.ledger_mut().set_unreachable(false);
    let second = s.create(UnixTimeMs(11), record("1001", "Theft", "Property"));
    assert!(matches!(second, Err(ComplaintStoreError::DuplicateNumber)));
}

#[test]
fn at_complaints_07_read_merge_prefers_ledger_on_collision() {
    let mut s = store();
    s.ledger_mut().set_unreachable(true);
    s.create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();
    s.ledger_mut().set_unreachable(false);
    s.create(UnixTimeMs(11), record("1002", "Arson", "Property"))
        .unwrap();

    // "1001" reconciles onto the chain; the outbox copy must not surface as
    // a stale duplicate afterwards.
    let metrics = s.reconcile_outbox();
    assert_eq!(metrics.published, 1);
    let listed = s.list_all();
    let numbers: Vec<&str> = listed
        .views
        .iter()
        .map(|v| v.record.number.as_str())
        .collect();
    assert_eq!(numbers.iter().filter(|n| **n == "1001").count(), 1);
    assert!(listed.views.iter().all(|v| v.verified));
}

#[test]
fn at_complaints_08_reports_share_the_stream_but_not_the_listing() {
    let mut s = store();
    s.create(UnixTimeMs(10), record("1001", "Theft", "Property"))
        .unwrap();
    let report = ReportRecord::v1(
        ComplaintNumber::new("1001").unwrap(),
        "Theft".to_string(),
        "1. Case Summary: ...".to_string(),
        Some(AccountEmail::new("examiner@agency.example").unwrap()),
        None,
        UnixTimeMs(99),
    )
    .unwrap();
    s.attach_report(&report).unwrap();

    // The report is on the stream, under its own key namespace.
    assert_eq!(s.ledger_mut().entry_count(&stream()), 2);
    // Complaint listings only surface complaints.
    let listed = s.list_all();
    assert_eq!(listed.views.len(), 1);
    assert_eq!(listed.skipped_records, 0);
    // The report key cannot collide with any valid complaint number.
    assert!(s
        .get_by_number(&ComplaintNumber::new("1001").unwrap())
        .is_some());
}
