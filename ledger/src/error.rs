//! Ledger error types.

use rentescrow_common::{Amount, RegistryError};
use thiserror::Error;

use crate::account::LedgerAccount;

/// Errors that can occur when applying a transfer batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Sender does not hold enough value.
    #[error("Insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: LedgerAccount,
        required: Amount,
        available: Amount,
    },

    /// Account refuses transfers.
    #[error("Account {0} is frozen")]
    AccountFrozen(LedgerAccount),

    /// Crediting would overflow the account balance.
    #[error("Balance overflow in {0}")]
    BalanceOverflow(LedgerAccount),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for RegistryError {
    fn from(e: LedgerError) -> Self {
        RegistryError::TransferFailed {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_maps_to_transfer_failed() {
        let err: RegistryError = LedgerError::AccountFrozen(LedgerAccount::party("owner")).into();
        assert_eq!(err.error_code(), "TRANSFER_FAILED");
        assert!(err.to_string().contains("party:owner"));
    }
}
