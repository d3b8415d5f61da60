//! RentEscrow Ledger
//!
//! Custody ledger used by the registry to take payments, forward rent and
//! release escrowed deposits. Every transfer batch applies completely or not
//! at all.

pub mod engine;
pub mod account;
pub mod journal;
pub mod balance;
pub mod error;

pub use engine::{InMemoryLedger, Ledger};
pub use account::LedgerAccount;
pub use journal::{EntryType, JournalEntry, TransferBatch, TransferLeg};
pub use balance::AccountBalance;
pub use error::{LedgerError, LedgerResult};
