//! Account balance tracking.

use chrono::{DateTime, Utc};
use rentescrow_common::Amount;
use serde::{Deserialize, Serialize};

use crate::account::LedgerAccount;

/// Account balance at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: LedgerAccount,
    pub balance: Amount,
    /// Whether the account currently refuses incoming and outgoing transfers.
    pub frozen: bool,
    /// When this balance was last updated.
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Create a new zero balance.
    pub fn zero(account: LedgerAccount) -> Self {
        Self {
            account,
            balance: Amount::ZERO,
            frozen: false,
            updated_at: Utc::now(),
        }
    }

    /// Check if the account can send `amount`.
    pub fn has_sufficient_funds(&self, amount: Amount) -> bool {
        self.balance >= amount
    }

    /// Check if account can transact.
    pub fn can_transact(&self) -> bool {
        !self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_checks() {
        let mut balance = AccountBalance::zero(LedgerAccount::party("tenant"));
        assert!(balance.has_sufficient_funds(Amount::ZERO));
        assert!(!balance.has_sufficient_funds(Amount::from(1u64)));

        balance.balance = Amount::from(800u64);
        assert!(balance.has_sufficient_funds(Amount::from(800u64)));
        assert!(!balance.has_sufficient_funds(Amount::from(801u64)));

        balance.frozen = true;
        assert!(!balance.can_transact());
    }
}
