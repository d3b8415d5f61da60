//! Error types for RentEscrow registry operations.

use std::fmt;

use crate::{AgreementId, Amount, Identity, PropertyId, Timestamp};
use thiserror::Error;

/// Entity a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Property(PropertyId),
    Agreement(AgreementId),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Property(id) => write!(f, "property {}", id),
            Entity::Agreement(id) => write!(f, "rental agreement {}", id),
        }
    }
}

/// Main error type for registry operations.
///
/// Every variant is terminal for the operation that produced it; nothing is
/// retried internally and stored state is left as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Unknown property or agreement.
    #[error("Not found: {0}")]
    NotFound(Entity),

    /// Caller is not allowed to perform the action.
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized {
        caller: Identity,
        action: &'static str,
    },

    /// Price per day must be greater than zero.
    #[error("Invalid price: price per day must be greater than zero")]
    InvalidPrice,

    /// Start date is not strictly before end date.
    #[error("Invalid date range: start {start} is not before end {end}")]
    InvalidDateRange { start: Timestamp, end: Timestamp },

    /// Start date is not strictly in the future.
    #[error("Start date {start} is not after current time {now}")]
    StartInPast { start: Timestamp, now: Timestamp },

    /// Property is currently not available for rent.
    #[error("Property {0} is not available")]
    NotAvailable(PropertyId),

    /// Property cannot be re-listed while an agreement is still active.
    #[error("Property {property_id} is rented under active agreement {agreement_id}")]
    RentalInProgress {
        property_id: PropertyId,
        agreement_id: AgreementId,
    },

    /// Rental period is shorter than one day.
    #[error("Rental period must cover at least one full day")]
    RentalTooShort,

    /// Paid amount differs from the exact total.
    #[error("Payment mismatch: expected {expected}, got {paid}")]
    PaymentMismatch { expected: Amount, paid: Amount },

    /// Agreement is no longer active.
    #[error("Rental agreement {0} is not active")]
    NotActive(AgreementId),

    /// Rental period has not fully elapsed.
    #[error("Rental period ends at {end_date}, current time {now}")]
    TooEarly { end_date: Timestamp, now: Timestamp },

    /// Security deposit was already returned.
    #[error("Security deposit for rental agreement {0} already returned")]
    AlreadyReturned(AgreementId),

    /// The ledger refused the transfer.
    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },

    /// Amount arithmetic overflowed.
    #[error("Amount overflow")]
    AmountOverflow,

    /// Id space exhausted.
    #[error("Identifier space exhausted")]
    IdExhausted,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl RegistryError {
    /// Whether the error originates outside the registry (ledger collaborator)
    /// rather than from input validation.
    pub fn is_external(&self) -> bool {
        matches!(self, RegistryError::TransferFailed { .. })
    }

    /// Get error code for logs and scenario assertions.
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "NOT_FOUND",
            RegistryError::Unauthorized { .. } => "UNAUTHORIZED",
            RegistryError::InvalidPrice => "INVALID_PRICE",
            RegistryError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            RegistryError::StartInPast { .. } => "START_IN_PAST",
            RegistryError::NotAvailable(_) => "NOT_AVAILABLE",
            RegistryError::RentalInProgress { .. } => "RENTAL_IN_PROGRESS",
            RegistryError::RentalTooShort => "RENTAL_TOO_SHORT",
            RegistryError::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            RegistryError::NotActive(_) => "NOT_ACTIVE",
            RegistryError::TooEarly { .. } => "TOO_EARLY",
            RegistryError::AlreadyReturned(_) => "ALREADY_RETURNED",
            RegistryError::TransferFailed { .. } => "TRANSFER_FAILED",
            RegistryError::AmountOverflow => "AMOUNT_OVERFLOW",
            RegistryError::IdExhausted => "ID_EXHAUSTED",
            RegistryError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RegistryError::NotFound(Entity::Property(PropertyId::new(7))).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            RegistryError::PaymentMismatch {
                expected: Amount::from(800u64),
                paid: Amount::from(799u64),
            }
            .error_code(),
            "PAYMENT_MISMATCH"
        );
    }

    #[test]
    fn test_only_transfer_failures_are_external() {
        let transfer = RegistryError::TransferFailed {
            reason: "frozen".to_string(),
        };
        assert!(transfer.is_external());
        assert!(!RegistryError::InvalidPrice.is_external());
        assert!(!RegistryError::AlreadyReturned(AgreementId::new(1)).is_external());
    }

    #[test]
    fn test_display_names_entity() {
        let err = RegistryError::NotFound(Entity::Agreement(AgreementId::new(3)));
        assert_eq!(err.to_string(), "Not found: rental agreement 3");
    }
}
