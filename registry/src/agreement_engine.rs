//! Agreement engine.
//!
//! Drives each rental agreement through its lifecycle:
//! 1. `Created` - payment collected, rent forwarded to the owner, security
//!    deposit held in custody, property taken off the market
//! 2. `Closed` - rental period elapsed, deposit paid back to the tenant,
//!    property back on the market
//!
//! Every store change made while creating an agreement is recorded in an
//! [`UndoLog`]; if the ledger refuses the payment batch the log is rolled back
//! and the call leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use rentescrow_common::{
    whole_units_between, AgreementId, Amount, Entity, Identity, Property, PropertyId,
    RegistryError, RegistryEvent, RentalAgreement, Result, Timestamp,
};
use rentescrow_ledger::{Ledger, LedgerAccount, TransferBatch};

use crate::state::RegistryState;
use crate::txn::{Undo, UndoLog};

/// Ledger reference of the batch that takes payment for an agreement.
pub fn creation_reference(agreement_id: AgreementId) -> String {
    format!("agreement:{}:create", agreement_id)
}

/// Ledger reference of the batch that refunds an agreement's deposit.
pub fn deposit_reference(agreement_id: AgreementId) -> String {
    format!("agreement:{}:deposit", agreement_id)
}

/// Price breakdown for a rental period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalQuote {
    /// Whole days in the period, rounded down.
    pub rental_days: u64,
    /// `rental_days * price_per_day`, forwarded to the owner.
    pub total_rent: Amount,
    /// Held in custody until the deposit is returned.
    pub security_deposit: Amount,
    /// Exact amount the tenant must pay.
    pub total_amount: Amount,
}

impl RentalQuote {
    /// Price `property` for `[start, end)`.
    ///
    /// Checks run in a fixed order: date range, start in the future, at least
    /// one whole day, then arithmetic overflow.
    pub fn compute(
        property: &Property,
        start: Timestamp,
        end: Timestamp,
        now: Timestamp,
        day_unit: Duration,
    ) -> Result<Self> {
        if start >= end {
            return Err(RegistryError::InvalidDateRange { start, end });
        }

        if start <= now {
            return Err(RegistryError::StartInPast { start, now });
        }

        let rental_days = whole_units_between(start, end, day_unit);
        if rental_days < 1 {
            return Err(RegistryError::RentalTooShort);
        }

        let total_rent = property
            .price_per_day
            .checked_mul(rental_days)
            .ok_or(RegistryError::AmountOverflow)?;
        let total_amount = total_rent
            .checked_add(property.security_deposit)
            .ok_or(RegistryError::AmountOverflow)?;

        Ok(Self {
            rental_days,
            total_rent,
            security_deposit: property.security_deposit,
            total_amount,
        })
    }
}

/// Agreement records plus tenant and active-rental indices.
#[derive(Debug, Default)]
pub struct AgreementBook {
    agreements: HashMap<AgreementId, RentalAgreement>,
    by_tenant: HashMap<Identity, Vec<AgreementId>>,
    active_by_property: HashMap<PropertyId, AgreementId>,
}

impl AgreementBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a book from persisted records, in id order.
    pub fn from_records(mut records: Vec<RentalAgreement>) -> Self {
        records.sort_by_key(|a| a.id);
        let mut book = Self::new();
        for agreement in records {
            book.insert(agreement);
        }
        book
    }

    pub(crate) fn insert(&mut self, agreement: RentalAgreement) {
        self.by_tenant
            .entry(agreement.tenant.clone())
            .or_insert_with(Vec::new)
            .push(agreement.id);
        if agreement.is_active {
            self.active_by_property
                .insert(agreement.property_id, agreement.id);
        }
        self.agreements.insert(agreement.id, agreement);
    }

    /// Remove an agreement and its index entries. Only used by rollback.
    pub(crate) fn remove(&mut self, id: AgreementId) -> Option<RentalAgreement> {
        let agreement = self.agreements.remove(&id)?;

        if let Some(ids) = self.by_tenant.get_mut(&agreement.tenant) {
            if ids.last() == Some(&id) {
                ids.pop();
            } else {
                ids.retain(|existing| *existing != id);
            }
            if ids.is_empty() {
                self.by_tenant.remove(&agreement.tenant);
            }
        }

        if self.active_by_property.get(&agreement.property_id) == Some(&id) {
            self.active_by_property.remove(&agreement.property_id);
        }

        Some(agreement)
    }

    /// Close an active agreement.
    pub(crate) fn close(&mut self, id: AgreementId, at: Timestamp) -> Result<&RentalAgreement> {
        let agreement = self
            .agreements
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(Entity::Agreement(id)))?;

        agreement
            .close(at)
            .map_err(|_| RegistryError::AlreadyReturned(id))?;
        self.active_by_property.remove(&agreement.property_id);

        Ok(agreement)
    }

    /// Get an agreement.
    pub fn get(&self, id: AgreementId) -> Result<&RentalAgreement> {
        self.agreements
            .get(&id)
            .ok_or(RegistryError::NotFound(Entity::Agreement(id)))
    }

    /// Agreements created by `tenant`, in creation order.
    pub fn list_by_tenant(&self, tenant: &Identity) -> &[AgreementId] {
        self.by_tenant
            .get(tenant)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// The active agreement on a property, if it is rented.
    pub fn active_for_property(&self, property_id: PropertyId) -> Option<AgreementId> {
        self.active_by_property.get(&property_id).copied()
    }

    /// All agreements, in id order.
    pub fn records(&self) -> Vec<RentalAgreement> {
        let mut records: Vec<RentalAgreement> = self.agreements.values().cloned().collect();
        records.sort_by_key(|a| a.id);
        records
    }

    pub fn len(&self) -> usize {
        self.agreements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agreements.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active_by_property.len()
    }
}

/// Result of a successful agreement creation.
#[derive(Debug, Clone)]
pub struct CreatedAgreement {
    pub agreement: RentalAgreement,
    pub quote: RentalQuote,
    pub owner: Identity,
}

impl CreatedAgreement {
    /// Events to emit, in order.
    pub fn events(&self) -> Vec<RegistryEvent> {
        vec![
            RegistryEvent::RentalAgreementCreated {
                agreement_id: self.agreement.id,
                property_id: self.agreement.property_id,
                tenant: self.agreement.tenant.clone(),
                start_date: self.agreement.start_date,
                end_date: self.agreement.end_date,
                total_amount: self.agreement.total_amount,
            },
            RegistryEvent::PaymentProcessed {
                agreement_id: self.agreement.id,
                payer: self.agreement.tenant.clone(),
                recipient: self.owner.clone(),
                amount: self.quote.total_rent,
            },
        ]
    }
}

/// Result of a successful deposit return.
#[derive(Debug, Clone)]
pub struct ReturnedDeposit {
    pub agreement: RentalAgreement,
}

impl ReturnedDeposit {
    pub fn events(&self) -> Vec<RegistryEvent> {
        vec![RegistryEvent::SecurityDepositReturned {
            agreement_id: self.agreement.id,
            tenant: self.agreement.tenant.clone(),
            amount: self.agreement.security_deposit,
        }]
    }
}

/// Creates and closes agreements against the registry state and the ledger.
pub struct AgreementEngine {
    ledger: Arc<dyn Ledger>,
    day_unit: Duration,
}

impl AgreementEngine {
    pub fn new(ledger: Arc<dyn Ledger>, day_unit: Duration) -> Self {
        Self { ledger, day_unit }
    }

    pub fn day_unit(&self) -> Duration {
        self.day_unit
    }

    /// Price a rental without changing anything.
    pub fn quote(
        &self,
        state: &RegistryState,
        property_id: PropertyId,
        start: Timestamp,
        end: Timestamp,
        now: Timestamp,
    ) -> Result<RentalQuote> {
        let property = state.properties.get(property_id)?;
        RentalQuote::compute(property, start, end, now, self.day_unit)
    }

    /// Create an agreement for `tenant`, who pays `paid`.
    ///
    /// On success the tenant has paid the total, the owner has received the
    /// rent, the deposit is held and the property is unavailable. On failure
    /// nothing has changed.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, state))]
    pub fn create_agreement(
        &self,
        state: &mut RegistryState,
        tenant: &Identity,
        property_id: PropertyId,
        start: Timestamp,
        end: Timestamp,
        paid: Amount,
        now: Timestamp,
    ) -> Result<CreatedAgreement> {
        let property = state.properties.get(property_id)?.clone();

        if !property.is_available {
            return Err(RegistryError::NotAvailable(property_id));
        }

        let quote = RentalQuote::compute(&property, start, end, now, self.day_unit)?;

        if paid != quote.total_amount {
            return Err(RegistryError::PaymentMismatch {
                expected: quote.total_amount,
                paid,
            });
        }

        let mut undo = UndoLog::new("create_agreement");
        match self.apply_creation(state, &mut undo, tenant, &property, start, end, quote, now) {
            Ok(agreement) => {
                undo.commit();

                info!(
                    agreement_id = %agreement.id,
                    rental_days = quote.rental_days,
                    total_rent = %quote.total_rent,
                    security_deposit = %quote.security_deposit,
                    "Rental agreement created"
                );

                Ok(CreatedAgreement {
                    agreement,
                    quote,
                    owner: property.owner,
                })
            }
            Err(e) => {
                undo.rollback(state);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_creation(
        &self,
        state: &mut RegistryState,
        undo: &mut UndoLog,
        tenant: &Identity,
        property: &Property,
        start: Timestamp,
        end: Timestamp,
        quote: RentalQuote,
        now: Timestamp,
    ) -> Result<RentalAgreement> {
        let previous = state.counters.agreements.last();
        let id = AgreementId::new(state.counters.agreements.next()?);
        undo.record(Undo::RewindAgreementSequence(previous));

        let agreement = RentalAgreement {
            id,
            property_id: property.id,
            tenant: tenant.clone(),
            start_date: start,
            end_date: end,
            rental_days: quote.rental_days,
            total_amount: quote.total_amount,
            security_deposit: quote.security_deposit,
            is_active: true,
            security_deposit_returned: false,
            created_at: now,
            closed_at: None,
        };
        state.agreements.insert(agreement.clone());
        undo.record(Undo::RemoveAgreement(id));

        state
            .escrow
            .place_hold(id, property.id, tenant.clone(), quote.security_deposit, now);
        undo.record(Undo::RemoveHold(id));

        let was_available = state.properties.mark_unavailable(property.id)?;
        undo.record(Undo::RestoreAvailability {
            property_id: property.id,
            was_available,
        });

        let batch = TransferBatch::new(creation_reference(id))
            .collect(LedgerAccount::from(tenant), quote.total_amount)
            .pay_out(LedgerAccount::from(&property.owner), quote.total_rent);

        self.ledger.execute(&batch).map_err(|e| {
            warn!(agreement_id = %id, error = %e, "Payment batch refused by ledger");
            RegistryError::from(e)
        })?;

        Ok(agreement)
    }

    /// Pay the security deposit back to the tenant and close the agreement.
    ///
    /// Allowed for the property owner and `admin`, once the rental period has
    /// fully elapsed. The transfer happens first; flags change only after the
    /// ledger confirmed it.
    #[instrument(skip(self, state, admin))]
    pub fn return_security_deposit(
        &self,
        state: &mut RegistryState,
        caller: &Identity,
        admin: &Identity,
        agreement_id: AgreementId,
        now: Timestamp,
    ) -> Result<ReturnedDeposit> {
        let agreement = state.agreements.get(agreement_id)?.clone();
        let property = state.properties.get(agreement.property_id)?;

        if !property.is_owned_by(caller) && caller != admin {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                action: "return security deposit",
            });
        }

        // A closed agreement reports the more specific reason.
        if agreement.security_deposit_returned {
            return Err(RegistryError::AlreadyReturned(agreement_id));
        }

        if !agreement.is_active {
            return Err(RegistryError::NotActive(agreement_id));
        }

        if now <= agreement.end_date {
            return Err(RegistryError::TooEarly {
                end_date: agreement.end_date,
                now,
            });
        }

        let batch = TransferBatch::new(deposit_reference(agreement_id))
            .pay_out(LedgerAccount::from(&agreement.tenant), agreement.security_deposit);

        self.ledger.execute(&batch).map_err(|e| {
            warn!(agreement_id = %agreement_id, error = %e, "Deposit refund refused by ledger");
            RegistryError::from(e)
        })?;

        let closed = state.agreements.close(agreement_id, now)?.clone();
        state.escrow.release(agreement_id, now);
        state.properties.mark_available(closed.property_id)?;

        info!(
            agreement_id = %agreement_id,
            tenant = %closed.tenant,
            amount = %closed.security_deposit,
            "Security deposit returned"
        );

        Ok(ReturnedDeposit { agreement: closed })
    }
}
