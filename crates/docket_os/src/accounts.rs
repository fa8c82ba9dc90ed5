#![forbid(unsafe_code)]

use docket_kernel_contracts::account::{AccountEmail, AccountRole, AccountView};
use docket_kernel_contracts::ledger::{LedgerClient, ReceiptId};
use docket_storage::account_store::{AccountStore, AccountStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFlowError {
    /// A request field is missing or malformed; nothing touched a store.
    Validation { field: &'static str, reason: String },
    /// Deliberately opaque: covers unknown accounts, wrong passwords, wrong
    /// roles, inactive accounts and ledger failures alike.
    InvalidCredentials,
    AlreadyExists,
    NotFound,
    Ledger { detail: String },
}

impl std::fmt::Display for AccountFlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, reason } => write!(f, "{field}: {reason}"),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::AlreadyExists => write!(f, "account already exists"),
            Self::NotFound => write!(f, "account not found"),
            Self::Ledger { detail } => write!(f, "ledger failure: {detail}"),
        }
    }
}

pub fn login<L: LedgerClient>(
    store: &AccountStore<L>,
    email_raw: &str,
    password: &str,
    role_raw: &str,
) -> Result<AccountView, AccountFlowError> {
    if email_raw.trim().is_empty() || password.is_empty() || role_raw.trim().is_empty() {
        return Err(AccountFlowError::Validation {
            field: "login",
            reason: "email, password and role are required".to_string(),
        });
    }
    // Past the required-field gate, every failure is the same failure.
    let email = AccountEmail::new(email_raw).map_err(|_| AccountFlowError::InvalidCredentials)?;
    let role = AccountRole::parse(role_raw).ok_or(AccountFlowError::InvalidCredentials)?;
    store
        .authenticate(&email, password, role)
        .map_err(|_| AccountFlowError::InvalidCredentials)
}

pub fn create_account<L: LedgerClient>(
    store: &mut AccountStore<L>,
    email_raw: &str,
    password: &str,
    role_raw: &str,
    active: bool,
) -> Result<ReceiptId, AccountFlowError> {
    let email = AccountEmail::new(email_raw).map_err(|violation| AccountFlowError::Validation {
        field: "email",
        reason: violation.to_string(),
    })?;
    let role = AccountRole::parse(role_raw).ok_or(AccountFlowError::Validation {
        field: "role",
        reason: "must be examiner, investigator or admin".to_string(),
    })?;
    if password.len() < 8 {
        return Err(AccountFlowError::Validation {
            field: "password",
            reason: "must be at least 8 chars".to_string(),
        });
    }
    store
        .create(&email, role, password, active)
        .map_err(map_store_error)
}

pub fn set_account_status<L: LedgerClient>(
    store: &mut AccountStore<L>,
    email_raw: &str,
    active_raw: &str,
) -> Result<ReceiptId, AccountFlowError> {
    let email = AccountEmail::new(email_raw).map_err(|violation| AccountFlowError::Validation {
        field: "email",
        reason: violation.to_string(),
    })?;
    let active = parse_active_flag(active_raw).ok_or(AccountFlowError::Validation {
        field: "status",
        reason: "must be a boolean marker (true/false)".to_string(),
    })?;
    store.set_status(&email, active).map_err(map_store_error)
}

/// The legacy surface sends "True"/"False" literals; be permissive about
/// casing and the usual boolean spellings, nothing else.
fn parse_active_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "active" => Some(true),
        "false" | "0" | "no" | "inactive" => Some(false),
        _ => None,
    }
}

fn map_store_error(err: AccountStoreError) -> AccountFlowError {
    match err {
        AccountStoreError::AlreadyExists => AccountFlowError::AlreadyExists,
        AccountStoreError::NotFound => AccountFlowError::NotFound,
        AccountStoreError::Ledger(err) => AccountFlowError::Ledger {
            detail: err.safe_detail().to_string(),
        },
        AccountStoreError::Contract(violation) => AccountFlowError::Validation {
            field: "account",
            reason: violation.to_string(),
        },
        AccountStoreError::Codec(err) => AccountFlowError::Ledger {
            detail: err.to_string(),
        },
    }
}
