//! Transfer capability and the in-memory ledger implementation.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use rentescrow_common::{Amount, Identity};

use crate::account::LedgerAccount;
use crate::balance::AccountBalance;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{self, EntryType, JournalEntry, TransferBatch};

/// Moves value between custody and external parties.
///
/// Implementations must apply a batch atomically: either every leg is
/// applied, or the call fails and no balance changes.
pub trait Ledger: Send + Sync {
    /// Apply all legs of `batch`.
    fn execute(&self, batch: &TransferBatch) -> LedgerResult<Vec<JournalEntry>>;

    /// Current balance of `account`.
    fn balance_of(&self, account: &LedgerAccount) -> Amount;

    /// Value currently held in the registry's custody.
    fn custody_balance(&self) -> Amount {
        self.balance_of(&LedgerAccount::Custody)
    }
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<LedgerAccount, AccountBalance>,
    frozen: HashSet<LedgerAccount>,
    journal: Vec<JournalEntry>,
    /// Value that entered the ledger through `fund`.
    funded: Amount,
}

impl LedgerState {
    fn balance(&self, account: &LedgerAccount) -> Amount {
        self.balances
            .get(account)
            .map(|b| b.balance)
            .unwrap_or(Amount::ZERO)
    }

    fn set_balance(&mut self, account: LedgerAccount, balance: Amount) {
        let entry = self
            .balances
            .entry(account.clone())
            .or_insert_with(|| AccountBalance::zero(account));
        entry.balance = balance;
        entry.updated_at = chrono::Utc::now();
    }
}

/// Ledger kept in process memory.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Credit an external party with value from outside the ledger.
    pub fn fund(&self, identity: &Identity, amount: Amount) -> LedgerResult<Amount> {
        let account = LedgerAccount::from(identity);
        let mut state = self.state.lock();

        let balance = state
            .balance(&account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(account.clone()))?;
        let funded = state
            .funded
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(account.clone()))?;

        state.set_balance(account.clone(), balance);
        state.funded = funded;

        debug!(account = %account, amount = %amount, balance = %balance, "Account funded");
        Ok(balance)
    }

    /// Make `account` refuse all transfers.
    pub fn freeze(&self, account: LedgerAccount) {
        warn!(account = %account, "Freezing account");
        let mut state = self.state.lock();
        state.frozen.insert(account.clone());
        if let Some(balance) = state.balances.get_mut(&account) {
            balance.frozen = true;
        }
    }

    /// Lift a freeze.
    pub fn unfreeze(&self, account: &LedgerAccount) {
        info!(account = %account, "Unfreezing account");
        let mut state = self.state.lock();
        state.frozen.remove(account);
        if let Some(balance) = state.balances.get_mut(account) {
            balance.frozen = false;
        }
    }

    /// Full balance record for `account`.
    pub fn balance(&self, account: &LedgerAccount) -> AccountBalance {
        let state = self.state.lock();
        let mut balance = state
            .balances
            .get(account)
            .cloned()
            .unwrap_or_else(|| AccountBalance::zero(account.clone()));
        balance.frozen = state.frozen.contains(account);
        balance
    }

    /// All journal entries in application order.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().journal.clone()
    }

    /// Journal entries for one batch reference.
    pub fn entries_for(&self, reference: &str) -> Vec<JournalEntry> {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|e| e.reference == reference)
            .cloned()
            .collect()
    }

    /// Verify ledger integrity: debits equal credits and no value was
    /// created or destroyed beyond what was funded.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock();

        if !journal::is_balanced(&state.journal) {
            return false;
        }

        let held = state
            .balances
            .values()
            .try_fold(Amount::ZERO, |acc, b| acc.checked_add(b.balance));

        held == Some(state.funded)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    #[instrument(skip(self, batch), fields(reference = %batch.reference, legs = batch.legs.len()))]
    fn execute(&self, batch: &TransferBatch) -> LedgerResult<Vec<JournalEntry>> {
        let mut state = self.state.lock();

        // Balances are staged and only written back once every leg has passed.
        let mut staged: HashMap<LedgerAccount, Amount> = HashMap::new();
        let mut entries = Vec::with_capacity(batch.legs.len() * 2);

        for (idx, leg) in batch.legs.iter().enumerate() {
            if leg.amount.is_zero() {
                continue;
            }

            for account in [&leg.from, &leg.to] {
                if state.frozen.contains(account) {
                    warn!(account = %account, "Transfer rejected by frozen account");
                    return Err(LedgerError::AccountFrozen(account.clone()));
                }
            }

            let leg_number = idx as u32 + 1;

            let from_balance = staged
                .get(&leg.from)
                .copied()
                .unwrap_or_else(|| state.balance(&leg.from));
            let from_after = from_balance.checked_sub(leg.amount).ok_or_else(|| {
                LedgerError::InsufficientFunds {
                    account: leg.from.clone(),
                    required: leg.amount,
                    available: from_balance,
                }
            })?;
            staged.insert(leg.from.clone(), from_after);

            let to_balance = staged
                .get(&leg.to)
                .copied()
                .unwrap_or_else(|| state.balance(&leg.to));
            let to_after = to_balance
                .checked_add(leg.amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(leg.to.clone()))?;
            staged.insert(leg.to.clone(), to_after);

            entries.push(JournalEntry::debit(
                &batch.reference,
                leg_number,
                leg.from.clone(),
                leg.amount,
                from_after,
            ));
            entries.push(JournalEntry::credit(
                &batch.reference,
                leg_number,
                leg.to.clone(),
                leg.amount,
                to_after,
            ));
        }

        for (account, balance) in staged {
            state.set_balance(account, balance);
        }
        state.journal.extend(entries.iter().cloned());

        info!(
            reference = %batch.reference,
            debited = %journal::total(&entries, EntryType::Debit),
            "Transfer batch applied"
        );

        Ok(entries)
    }

    fn balance_of(&self, account: &LedgerAccount) -> Amount {
        self.state.lock().balance(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn funded_ledger() -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        ledger.fund(&Identity::new("tenant"), Amount::from(1000u64)).unwrap();
        ledger
    }

    fn tenant() -> LedgerAccount {
        LedgerAccount::party("tenant")
    }

    fn owner() -> LedgerAccount {
        LedgerAccount::party("owner")
    }

    #[test]
    fn test_batch_applies_all_legs() {
        let ledger = funded_ledger();
        let batch = TransferBatch::new("agreement:1:create")
            .collect(tenant(), Amount::from(800u64))
            .pay_out(owner(), Amount::from(300u64));

        let entries = ledger.execute(&batch).unwrap();

        assert_eq!(entries.len(), 4);
        assert!(journal::is_balanced(&entries));
        assert_eq!(ledger.balance_of(&tenant()), Amount::from(200u64));
        assert_eq!(ledger.balance_of(&owner()), Amount::from(300u64));
        assert_eq!(ledger.custody_balance(), Amount::from(500u64));
        assert!(ledger.verify_integrity());
    }

    #[test]
    fn test_failed_leg_leaves_no_trace() {
        let ledger = funded_ledger();
        ledger.freeze(owner());

        let batch = TransferBatch::new("agreement:1:create")
            .collect(tenant(), Amount::from(800u64))
            .pay_out(owner(), Amount::from(300u64));

        let err = ledger.execute(&batch).unwrap_err();
        assert_eq!(err, LedgerError::AccountFrozen(owner()));

        assert_eq!(ledger.balance_of(&tenant()), Amount::from(1000u64));
        assert_eq!(ledger.custody_balance(), Amount::ZERO);
        assert!(ledger.journal().is_empty());
        assert!(ledger.verify_integrity());
    }

    #[test]
    fn test_insufficient_funds() {
        let ledger = funded_ledger();
        let batch = TransferBatch::new("overdraw").collect(tenant(), Amount::from(1001u64));

        match ledger.execute(&batch) {
            Err(LedgerError::InsufficientFunds { available, .. }) => {
                assert_eq!(available, Amount::from(1000u64));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(ledger.balance_of(&tenant()), Amount::from(1000u64));
    }

    #[test]
    fn test_zero_amount_leg_is_noop() {
        let ledger = InMemoryLedger::new();
        let batch = TransferBatch::new("deposit:1").pay_out(tenant(), Amount::ZERO);

        let entries = ledger.execute(&batch).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_unfreeze_restores_transfers() {
        let ledger = funded_ledger();
        ledger.freeze(tenant());
        assert!(ledger.balance(&tenant()).frozen);

        let batch = TransferBatch::new("pay").collect(tenant(), Amount::from(10u64));
        assert!(ledger.execute(&batch).is_err());

        ledger.unfreeze(&tenant());
        assert!(ledger.execute(&batch).is_ok());
        assert_eq!(ledger.entries_for("pay").len(), 2);
    }

    proptest! {
        #[test]
        fn prop_value_is_conserved(amounts in proptest::collection::vec(0u64..2_000, 1..8)) {
            let ledger = funded_ledger();
            for (i, amount) in amounts.iter().enumerate() {
                let batch = TransferBatch::new(format!("batch:{}", i))
                    .collect(tenant(), Amount::from(*amount))
                    .pay_out(owner(), Amount::from(*amount / 2));
                let _ = ledger.execute(&batch);
            }

            let total = ledger.balance_of(&tenant())
                .checked_add(ledger.balance_of(&owner()))
                .and_then(|a| a.checked_add(ledger.custody_balance()))
                .unwrap();
            prop_assert_eq!(total, Amount::from(1000u64));
            prop_assert!(ledger.verify_integrity());
        }
    }
}
