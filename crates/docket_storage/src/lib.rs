#![forbid(unsafe_code)]

pub mod account_store;
pub mod codec;
pub mod complaint_store;
pub mod credential;
pub mod memory_ledger;
pub mod outbox;
