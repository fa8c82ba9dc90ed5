#![forbid(unsafe_code)]

use docket_kernel_contracts::account::{AccountEmail, AccountRecord, AccountRole, AccountView};
use docket_kernel_contracts::ledger::{LedgerClient, LedgerError, ReceiptId, RecordKey, StreamName};
use docket_kernel_contracts::record::DomainRecord;
use docket_kernel_contracts::ContractViolation;

use crate::codec;
use crate::credential;

#[derive(Debug)]
pub enum AccountStoreError {
    AlreadyExists,
    NotFound,
    Ledger(LedgerError),
    Contract(ContractViolation),
    Codec(codec::CodecError),
}

impl std::fmt::Display for AccountStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "account already exists"),
            Self::NotFound => write!(f, "account not found"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Contract(violation) => write!(f, "{violation}"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl From<codec::CodecError> for AccountStoreError {
    fn from(value: codec::CodecError) -> Self {
        Self::Codec(value)
    }
}

impl From<LedgerError> for AccountStoreError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<ContractViolation> for AccountStoreError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

/// Authentication deliberately collapses every failure mode to one value:
/// the boundary never distinguishes "no such account" from "wrong password"
/// or "ledger down", which keeps account enumeration blind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCredentials;

impl std::fmt::Display for InvalidCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid credentials")
    }
}

/// Accounts as an append-only key-value log on the accounts stream. The
/// logical account for an email is the decode of the most recently appended
/// record under that key; updates re-append the full record.
#[derive(Debug)]
pub struct AccountStore<L: LedgerClient> {
    ledger: L,
    stream: StreamName,
}

impl<L: LedgerClient> AccountStore<L> {
    pub fn new(ledger: L, stream: StreamName) -> Self {
        Self { ledger, stream }
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Fails `AlreadyExists` if *any* physical record exists for the email,
    /// stale versions included.
    pub fn create(
        &mut self,
        email: &AccountEmail,
        role: AccountRole,
        password: &str,
        active: bool,
    ) -> Result<ReceiptId, AccountStoreError> {
        let key = RecordKey::new(email.as_str())?;
        if !self.ledger.list_by_key(&self.stream, &key)?.is_empty() {
            return Err(AccountStoreError::AlreadyExists);
        }
        let hashed = credential::hash_password(password)?;
        let record = AccountRecord::v1(role, hashed, active)?;
        let bytes = codec::encode(&DomainRecord::Account(record))?;
        Ok(self.ledger.append(&self.stream, &key, &bytes)?)
    }

    /// The current logical record for an email, or None when no decodable
    /// record exists. Malformed historical versions are skipped.
    pub fn current(&self, email: &AccountEmail) -> Result<Option<AccountRecord>, AccountStoreError> {
        let key = RecordKey::new(email.as_str())?;
        let entries = self.ledger.list_by_key(&self.stream, &key)?;
        Ok(entries
            .iter()
            .rev()
            .find_map(|entry| match codec::decode(&entry.bytes) {
                Ok(DomainRecord::Account(record)) => Some(record),
                _ => None,
            }))
    }

    pub fn authenticate(
        &self,
        email: &AccountEmail,
        password: &str,
        role: AccountRole,
    ) -> Result<AccountView, InvalidCredentials> {
        let record = self
            .current(email)
            .ok()
            .flatten()
            .ok_or(InvalidCredentials)?;
        if record.role != role {
            return Err(InvalidCredentials);
        }
        if !credential::verify_password(password, &record.credential) {
            return Err(InvalidCredentials);
        }
        if !record.active {
            return Err(InvalidCredentials);
        }
        Ok(AccountView {
            email: email.clone(),
            role: record.role,
            active: record.active,
        })
    }

    /// Re-appends the full record with only the active flag changed; role
    /// and credential bytes pass through untouched.
    pub fn set_status(
        &mut self,
        email: &AccountEmail,
        active: bool,
    ) -> Result<ReceiptId, AccountStoreError> {
        let existing = self.current(email)?.ok_or(AccountStoreError::NotFound)?;
        let updated = AccountRecord {
            active,
            ..existing
        };
        let key = RecordKey::new(email.as_str())?;
        let bytes = codec::encode(&DomainRecord::Account(updated))?;
        Ok(self.ledger.append(&self.stream, &key, &bytes)?)
    }
}
