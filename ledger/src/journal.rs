//! Transfer batches and journal entries for double-entry bookkeeping.

use chrono::{DateTime, Utc};
use rentescrow_common::Amount;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::LedgerAccount;

/// A single directional movement of value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub from: LedgerAccount,
    pub to: LedgerAccount,
    pub amount: Amount,
}

impl TransferLeg {
    pub fn new(from: LedgerAccount, to: LedgerAccount, amount: Amount) -> Self {
        Self { from, to, amount }
    }
}

/// Legs that must be applied together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBatch {
    /// Business reference, e.g. `agreement:3:create`.
    pub reference: String,
    pub legs: Vec<TransferLeg>,
}

impl TransferBatch {
    /// Create an empty batch.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            legs: Vec::new(),
        }
    }

    /// Add a leg.
    pub fn leg(mut self, from: LedgerAccount, to: LedgerAccount, amount: Amount) -> Self {
        self.legs.push(TransferLeg::new(from, to, amount));
        self
    }

    /// Add a payment into custody.
    pub fn collect(self, from: LedgerAccount, amount: Amount) -> Self {
        self.leg(from, LedgerAccount::Custody, amount)
    }

    /// Add a payout out of custody.
    pub fn pay_out(self, to: LedgerAccount, amount: Amount) -> Self {
        self.leg(LedgerAccount::Custody, to, amount)
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

/// Type of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Value leaves the account.
    Debit,
    /// Value enters the account.
    Credit,
}

/// A single journal entry in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// Reference of the batch this entry belongs to.
    pub reference: String,
    /// Leg number within the batch, starting at 1.
    pub leg_number: u32,
    /// Account affected.
    pub account: LedgerAccount,
    /// Entry type (debit or credit).
    pub entry_type: EntryType,
    pub amount: Amount,
    /// Balance of `account` after this entry.
    pub balance_after: Amount,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create a debit entry.
    pub fn debit(
        reference: &str,
        leg_number: u32,
        account: LedgerAccount,
        amount: Amount,
        balance_after: Amount,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            leg_number,
            account,
            entry_type: EntryType::Debit,
            amount,
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Create a credit entry.
    pub fn credit(
        reference: &str,
        leg_number: u32,
        account: LedgerAccount,
        amount: Amount,
        balance_after: Amount,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            leg_number,
            account,
            entry_type: EntryType::Credit,
            amount,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Check that debits equal credits over a set of entries.
pub fn is_balanced(entries: &[JournalEntry]) -> bool {
    total(entries, EntryType::Debit) == total(entries, EntryType::Credit)
}

/// Sum of entries of one type. Saturates instead of overflowing.
pub fn total(entries: &[JournalEntry], entry_type: EntryType) -> Amount {
    entries
        .iter()
        .filter(|e| e.entry_type == entry_type)
        .fold(Amount::ZERO, |acc, e| {
            acc.checked_add(e.amount).unwrap_or(Amount::new(u128::MAX))
        })
}
