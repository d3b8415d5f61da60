//! Identifier types for RentEscrow registry entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{RegistryError, Result};

/// Identifier of a registered property.
/// Assigned sequentially starting at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(u64);

impl PropertyId {
    /// Create from a raw sequence value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw sequence value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a rental agreement.
/// Assigned sequentially starting at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(u64);

impl AgreementId {
    /// Create from a raw sequence value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw sequence value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a caller (owner, tenant or admin).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create a new identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the identity format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 128
            && !self.0.chars().any(char::is_whitespace)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for an emitted event.
/// Uses UUID v7 for time-ordered identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new event ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id counter. Starts at zero; the first issued id is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequence {
    last: u64,
}

impl IdSequence {
    /// Create a counter that has issued nothing yet.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    #[cfg(test)]
    fn resume(last: u64) -> Self {
        Self { last }
    }

    /// Last issued value (0 if none).
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Issue the next value.
    pub fn next(&mut self) -> Result<u64> {
        let next = self.last.checked_add(1).ok_or(RegistryError::IdExhausted)?;
        self.last = next;
        Ok(next)
    }

    /// Wind the counter back to `last`. Only used to undo an aborted operation.
    pub fn rewind(&mut self, last: u64) {
        debug_assert!(last <= self.last);
        self.last = last;
    }
}
