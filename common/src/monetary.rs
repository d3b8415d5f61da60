//! Monetary amounts for the RentEscrow registry.
//!
//! Amounts are unsigned integers in the smallest currency unit. There is a
//! single implicit currency.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount in the smallest currency unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Create a new amount.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Multiply by a unit count (e.g. price per day times days).
    pub fn checked_mul(self, units: u64) -> Option<Amount> {
        self.0.checked_mul(u128::from(units)).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(u128::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        let price = Amount::from(100u64);
        let rent = price.checked_mul(3).unwrap();
        assert_eq!(rent, Amount::from(300u64));

        let total = rent.checked_add(Amount::from(500u64)).unwrap();
        assert_eq!(total.value(), 800);
        assert_eq!(total.checked_sub(rent), Some(Amount::from(500u64)));
        assert_eq!(rent.checked_sub(total), None);
    }

    #[test]
    fn test_overflow_is_detected() {
        let huge = Amount::new(u128::MAX);
        assert!(huge.checked_add(Amount::new(1)).is_none());
        assert!(huge.checked_mul(2).is_none());
        assert_eq!(huge.checked_mul(1), Some(huge));
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&Amount::from(800u64)).unwrap();
        assert_eq!(json, "800");
    }
}
