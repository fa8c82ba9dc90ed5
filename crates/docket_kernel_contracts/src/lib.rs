#![forbid(unsafe_code)]

pub mod account;
pub mod common;
pub mod complaint;
pub mod ledger;
pub mod provider_secrets;
pub mod record;
pub mod report;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeMs, Validate};
