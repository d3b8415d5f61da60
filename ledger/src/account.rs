//! Account definitions for ledger.

use rentescrow_common::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An account that can hold value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAccount {
    /// The registry's own custody. Holds escrowed deposits.
    Custody,
    /// An external party (owner, tenant or admin).
    Party(Identity),
}

impl LedgerAccount {
    /// Account of an external party.
    pub fn party(identity: impl Into<Identity>) -> Self {
        LedgerAccount::Party(identity.into())
    }

    /// Check if this is the custody account.
    pub fn is_custody(&self) -> bool {
        matches!(self, LedgerAccount::Custody)
    }
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerAccount::Custody => write!(f, "custody"),
            LedgerAccount::Party(id) => write!(f, "party:{}", id),
        }
    }
}

impl From<&Identity> for LedgerAccount {
    fn from(identity: &Identity) -> Self {
        LedgerAccount::Party(identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_display() {
        assert_eq!(LedgerAccount::Custody.to_string(), "custody");
        assert_eq!(LedgerAccount::party("alice").to_string(), "party:alice");
        assert!(LedgerAccount::Custody.is_custody());
        assert!(!LedgerAccount::from(&Identity::new("bob")).is_custody());
    }
}
