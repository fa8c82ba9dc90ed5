#![forbid(unsafe_code)]

use docket_kernel_contracts::account::{AccountEmail, AccountRole};
use docket_kernel_contracts::ledger::StreamName;
use docket_storage::account_store::{AccountStore, AccountStoreError};
use docket_storage::memory_ledger::MemoryLedger;

fn store() -> AccountStore<MemoryLedger> {
    AccountStore::new(MemoryLedger::new(), StreamName::new("accounts").unwrap())
}

fn email(raw: &str) -> AccountEmail {
    AccountEmail::new(raw).unwrap()
}

#[test]
fn at_accounts_01_create_then_authenticate_roundtrip() {
    let mut s = store();
    let examiner = email("examiner@agency.example");
    s.create(&examiner, AccountRole::Examiner, "pass-1234", true)
        .unwrap();

    let view = s
        .authenticate(&examiner, "pass-1234", AccountRole::Examiner)
        .unwrap();
    assert_eq!(view.email, examiner);
    assert_eq!(view.role, AccountRole::Examiner);
    assert!(view.active);
}

#[test]
fn at_accounts_02_create_rejects_any_prior_record() {
    let mut s = store();
    let examiner = email("examiner@agency.example");
    s.create(&examiner, AccountRole::Examiner, "pass-1234", true)
        .unwrap();
    assert!(matches!(
        s.create(&examiner, AccountRole::Admin, "other-pass", true),
        Err(AccountStoreError::AlreadyExists)
    ));
}

#[test]
fn at_accounts_03_authenticate_collapses_all_failures() {
    let mut s = store();
    let examiner = email("examiner@agency.example");
    s.create(&examiner, AccountRole::Examiner, "pass-1234", true)
        .unwrap();

    // Wrong password.
    assert!(s
        .authenticate(&examiner, "wrong", AccountRole::Examiner)
        .is_err());
    // Wrong role, right password.
    assert!(s
        .authenticate(&examiner, "pass-1234", AccountRole::Admin)
        .is_err());
    // Unknown account.
    assert!(s
        .authenticate(
            &email("ghost@agency.example"),
            "pass-1234",
            AccountRole::Examiner
        )
        .is_err());
    // Ledger down: still just invalid credentials, no distinct signal.
    s.ledger_mut().set_unreachable(true);
    assert!(s
        .authenticate(&examiner, "pass-1234", AccountRole::Examiner)
        .is_err());
}

#[test]
fn at_accounts_04_set_status_preserves_role_and_credential() {
    let mut s = store();
    let examiner = email("examiner@agency.example");
    s.create(&examiner, AccountRole::Examiner, "pass-1234", true)
        .unwrap();
    let before = s.current(&examiner).unwrap().unwrap();

    s.set_status(&examiner, false).unwrap();

    // Deactivated accounts cannot authenticate even with the right password.
    assert!(s
        .authenticate(&examiner, "pass-1234", AccountRole::Examiner)
        .is_err());

    let after = s.current(&examiner).unwrap().unwrap();
    assert!(!after.active);
    assert_eq!(after.role, before.role);
    assert_eq!(after.credential, before.credential);

    // Reactivation restores access without touching the credential.
    s.set_status(&examiner, true).unwrap();
    assert!(s
        .authenticate(&examiner, "pass-1234", AccountRole::Examiner)
        .is_ok());
}

#[test]
fn at_accounts_05_current_is_last_write_wins_by_append_order() {
    let mut s = store();
    let examiner = email("examiner@agency.example");
    s.create(&examiner, AccountRole::Examiner, "pass-1234", true)
        .unwrap();
    s.set_status(&examiner, false).unwrap();
    s.set_status(&examiner, true).unwrap();
    s.set_status(&examiner, false).unwrap();

    let current = s.current(&examiner).unwrap().unwrap();
    assert!(!current.active);
}

#[test]
fn at_accounts_06_set_status_on_unknown_account_is_not_found() {
    let mut s = store();
    assert!(matches!(
        s.set_status(&email("ghost@agency.example"), false),
        Err(AccountStoreError::NotFound)
    ));
}
