//! Compensating actions for multi-step registry mutations.
//!
//! A mutation records one [`Undo`] per store change it makes. If a later step
//! fails (typically the ledger transfer), the log is rolled back in reverse
//! order and the registry state is exactly what it was before the call.

use tracing::{debug, warn};

use rentescrow_common::{AgreementId, PropertyId};

use crate::state::RegistryState;

/// A single compensating action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// Wind the agreement counter back to this value.
    RewindAgreementSequence(u64),
    /// Drop a freshly inserted agreement and its index entries.
    RemoveAgreement(AgreementId),
    /// Drop a freshly placed escrow hold.
    RemoveHold(AgreementId),
    /// Put the availability flag back.
    RestoreAvailability {
        property_id: PropertyId,
        was_available: bool,
    },
}

/// Ordered log of compensating actions for one operation.
#[derive(Debug)]
pub struct UndoLog {
    operation: &'static str,
    actions: Vec<Undo>,
}

impl UndoLog {
    /// Start a log for `operation`.
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            actions: Vec::new(),
        }
    }

    /// Record the compensation for a change that was just applied.
    pub fn record(&mut self, undo: Undo) {
        self.actions.push(undo);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keep all applied changes.
    pub fn commit(self) {
        debug!(operation = self.operation, steps = self.actions.len(), "Changes committed");
    }

    /// Revert all applied changes, newest first.
    pub fn rollback(self, state: &mut RegistryState) {
        warn!(
            operation = self.operation,
            steps = self.actions.len(),
            "Rolling back registry changes"
        );

        for action in self.actions.into_iter().rev() {
            match action {
                Undo::RewindAgreementSequence(last) => state.counters.agreements.rewind(last),
                Undo::RemoveAgreement(id) => {
                    state.agreements.remove(id);
                }
                Undo::RemoveHold(id) => state.escrow.remove(id),
                Undo::RestoreAvailability {
                    property_id,
                    was_available,
                } => state.properties.restore_availability(property_id, was_available),
            }
        }
    }
}
