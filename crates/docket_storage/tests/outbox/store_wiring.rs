#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use docket_kernel_contracts::complaint::{ComplaintNumber, ComplaintRecord, Severity};
use docket_kernel_contracts::ledger::StreamName;
use docket_kernel_contracts::record::DomainRecord;
use docket_kernel_contracts::ledger::LedgerClient;
use docket_kernel_contracts::UnixTimeMs;
use docket_storage::codec;
use docket_storage::memory_ledger::MemoryLedger;
use docket_storage::outbox::DurableOutbox;

fn temp_outbox_path(name: &str) -> (PathBuf, PathBuf) {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    let base = std::env::temp_dir().join(format!("docket-outbox-test-{name}-{suffix}"));
    let path = base.join("outbox.jsonl");
    (base, path)
}

fn record(number: &str) -> ComplaintRecord {
    ComplaintRecord::v1(
        ComplaintNumber::new(number).unwrap(),
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
fn at_outbox_wiring_01_entries_survive_reopen() {
    let (base, path) = temp_outbox_path("reopen");
    let (mut outbox, dropped) = DurableOutbox::open(path.clone()).unwrap();
    assert_eq!(dropped, 0);
    outbox.push(record("1001"), UnixTimeMs(10)).unwrap();
    outbox.push(record("1002"), UnixTimeMs(11)).unwrap();
    drop(outbox);

    let (reopened, dropped) = DurableOutbox::open(path).unwrap();
    assert_eq!(dropped, 0);
    assert_eq!(reopened.len(), 2);
    assert!(reopened.contains_number(&ComplaintNumber::new("1001").unwrap()));
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_outbox_wiring_02_corrupt_lines_are_dropped_and_counted() {
    let (base, path) = temp_outbox_path("corrupt");
    let (mut outbox, _) = DurableOutbox::open(path.clone()).unwrap();
    outbox.push(record("1001"), UnixTimeMs(10)).unwrap();
    drop(outbox);

    let mut raw = fs::read_to_string(&path).unwrap();
    raw.push_str("{not valid json\n");
    fs::write(&path, raw).unwrap();

    let (reopened, dropped) = DurableOutbox::open(path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(dropped, 1);
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_outbox_wiring_03_reconcile_publishes_clean_records_and_drains() {
    let (base, path) = temp_outbox_path("reconcile");
    let (mut outbox, _) = DurableOutbox::open(path.clone()).unwrap();
    let mut failed = record("1001");
    failed.confirmation = Some(docket_kernel_contracts::complaint::ChainConfirmation {
        receipt: None,
        verified: false,
        detail: Some("ledger unreachable: connect".to_string()),
    });
    outbox.push(failed, UnixTimeMs(10)).unwrap();

    let mut ledger = MemoryLedger::new();
    let stream = StreamName::new("complaints").unwrap();
    let metrics = outbox.reconcile_pass(&mut ledger, &stream);
    assert_eq!(metrics.attempted, 1);
    assert_eq!(metrics.published, 1);
    assert_eq!(metrics.still_pending, 0);
    assert!(outbox.is_empty());

    // The republished chain copy carries no stale unverified confirmation.
    let entries = ledger.list_all(&stream).unwrap();
    assert_eq!(entries.len(), 1);
    match codec::decode(&entries[0].bytes).unwrap() {
        DomainRecord::Complaint(published) => assert!(published.confirmation.is_none()),
        other => panic!("unexpected record variant: {other:?}"),
    }

    // The file reflects the drained state after the pass.
    let (reopened, _) = DurableOutbox::open(path).unwrap();
    assert!(reopened.is_empty());
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_outbox_wiring_04_failed_reconcile_keeps_entry_with_attempt_count() {
    let (base, path) = temp_outbox_path("retry");
    let (mut outbox, _) = DurableOutbox::open(path).unwrap();
    outbox.push(record("1001"), UnixTimeMs(10)).unwrap();

    let mut ledger = MemoryLedger::new();
    ledger.set_unreachable(true);
    let stream = StreamName::new("complaints").unwrap();

    let first = outbox.reconcile_pass(&mut ledger, &stream);
    assert_eq!(first.published, 0);
    assert_eq!(first.still_pending, 1);
    let second = outbox.reconcile_pass(&mut ledger, &stream);
    assert_eq!(second.still_pending, 1);
    assert_eq!(outbox.entries()[0].attempts, 2);

    ledger.set_unreachable(false);
    let third = outbox.reconcile_pass(&mut ledger, &stream);
    assert_eq!(third.published, 1);
    assert!(outbox.is_empty());
    fs::remove_dir_all(base).unwrap();
}
