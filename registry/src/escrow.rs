//! Escrow holds for security deposits.
//!
//! Every agreement places one hold for its security deposit when it is
//! created. The hold is released when the deposit is paid back to the tenant.
//! The sum of `Held` holds is the registry's outstanding liability.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use rentescrow_common::{AgreementId, Amount, Identity, PropertyId, Timestamp};

/// Hold status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    /// Deposit sits in custody.
    Held,
    /// Deposit was paid back to the tenant.
    Released,
}

/// A security deposit held in custody for one agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowHold {
    pub agreement_id: AgreementId,
    pub property_id: PropertyId,
    /// Tenant the deposit is owed to.
    pub tenant: Identity,
    pub amount: Amount,
    pub status: HoldStatus,
    pub held_at: Timestamp,
    pub released_at: Option<Timestamp>,
}

impl EscrowHold {
    /// Check if the deposit is still held.
    pub fn is_held(&self) -> bool {
        self.status == HoldStatus::Held
    }
}

/// Book of escrow holds, indexed by agreement and by tenant.
#[derive(Debug, Default)]
pub struct EscrowBook {
    holds: HashMap<AgreementId, EscrowHold>,
    by_tenant: HashMap<Identity, Vec<AgreementId>>,
}

impl EscrowBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a book from persisted holds.
    pub fn from_holds(mut holds: Vec<EscrowHold>) -> Self {
        holds.sort_by_key(|h| h.agreement_id);
        let mut book = Self::new();
        for hold in holds {
            book.insert(hold);
        }
        book
    }

    /// Place a hold for a newly created agreement.
    pub fn place_hold(
        &mut self,
        agreement_id: AgreementId,
        property_id: PropertyId,
        tenant: Identity,
        amount: Amount,
        now: Timestamp,
    ) -> EscrowHold {
        let hold = EscrowHold {
            agreement_id,
            property_id,
            tenant,
            amount,
            status: HoldStatus::Held,
            held_at: now,
            released_at: None,
        };

        self.insert(hold.clone());

        info!(
            agreement_id = %agreement_id,
            amount = %amount,
            "Security deposit held in escrow"
        );

        hold
    }

    fn insert(&mut self, hold: EscrowHold) {
        self.by_tenant
            .entry(hold.tenant.clone())
            .or_insert_with(Vec::new)
            .push(hold.agreement_id);
        self.holds.insert(hold.agreement_id, hold);
    }

    /// Release a held deposit. Returns the released amount, or `None` if no
    /// hold is outstanding for the agreement.
    pub fn release(&mut self, agreement_id: AgreementId, now: Timestamp) -> Option<Amount> {
        let hold = self.holds.get_mut(&agreement_id)?;
        if !hold.is_held() {
            return None;
        }

        hold.status = HoldStatus::Released;
        hold.released_at = Some(now);

        info!(
            agreement_id = %agreement_id,
            amount = %hold.amount,
            "Security deposit released from escrow"
        );

        Some(hold.amount)
    }

    /// Drop a hold entirely. Only used to undo an aborted agreement creation.
    pub(crate) fn remove(&mut self, agreement_id: AgreementId) {
        if let Some(hold) = self.holds.remove(&agreement_id) {
            if let Some(ids) = self.by_tenant.get_mut(&hold.tenant) {
                ids.retain(|id| *id != agreement_id);
                if ids.is_empty() {
                    self.by_tenant.remove(&hold.tenant);
                }
            }
        }
    }

    /// Get a hold by agreement.
    pub fn get(&self, agreement_id: AgreementId) -> Option<&EscrowHold> {
        self.holds.get(&agreement_id)
    }

    /// Amount currently held for an agreement (zero once released).
    pub fn held_for(&self, agreement_id: AgreementId) -> Amount {
        self.holds
            .get(&agreement_id)
            .filter(|h| h.is_held())
            .map(|h| h.amount)
            .unwrap_or(Amount::ZERO)
    }

    /// Total amount currently held across all agreements.
    pub fn total_held(&self) -> Amount {
        self.holds
            .values()
            .filter(|h| h.is_held())
            .fold(Amount::ZERO, |acc, h| {
                acc.checked_add(h.amount).unwrap_or(Amount::new(u128::MAX))
            })
    }

    /// Number of outstanding holds.
    pub fn active_hold_count(&self) -> usize {
        self.holds.values().filter(|h| h.is_held()).count()
    }

    /// All holds owed to a tenant, in agreement order.
    pub fn holds_for_tenant(&self, tenant: &Identity) -> Vec<&EscrowHold> {
        self.by_tenant
            .get(tenant)
            .map(|ids| ids.iter().filter_map(|id| self.holds.get(id)).collect())
            .unwrap_or_default()
    }

    /// All holds, in agreement order.
    pub fn holds(&self) -> Vec<EscrowHold> {
        let mut holds: Vec<EscrowHold> = self.holds.values().cloned().collect();
        holds.sort_by_key(|h| h.agreement_id);
        holds
    }
}
