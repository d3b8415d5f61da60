//! Registry façade.
//!
//! Every public operation takes the caller identity explicitly, samples the
//! clock once, and runs to completion under the registry lock. Events are
//! published before the lock is released so subscribers observe them in the
//! same order the mutations were applied.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use rentescrow_common::{
    AgreementId, Amount, Clock, EventEnvelope, Identity, Property, PropertyId, PropertyListing,
    RegistryError, RegistryEvent, RentalAgreement, Result, Timestamp,
};
use rentescrow_ledger::{Ledger, LedgerAccount, TransferBatch};

use crate::agreement_engine::{AgreementEngine, RentalQuote};
use crate::audit::{AuditRecord, AuditTrail};
use crate::config::RegistryConfig;
use crate::events::EventBus;
use crate::metrics::{RegistryMetrics, SharedMetrics};
use crate::state::{RegistrySnapshot, RegistryState};

/// Rental property registry with escrowed security deposits.
///
/// The admin identity is fixed at construction. It may return any deposit
/// and may drain the whole custody balance through [`Registry::recover_funds`].
/// That recovery path bypasses every escrow hold: it is a deliberate trust
/// concentration in the admin, not an invariant-preserving operation.
pub struct Registry {
    config: RegistryConfig,
    state: Mutex<RegistryState>,
    engine: AgreementEngine,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    audit: Mutex<AuditTrail>,
    metrics: SharedMetrics,
}

impl Registry {
    /// Create an empty registry. Id counters start at zero.
    pub fn new(config: RegistryConfig, ledger: Arc<dyn Ledger>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate().map_err(RegistryError::ConfigurationError)?;
        Self::build(config, RegistryState::new(), ledger, clock)
    }

    /// Rebuild a registry from a snapshot taken with the same admin.
    pub fn restore(
        config: RegistryConfig,
        snapshot: RegistrySnapshot,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(RegistryError::ConfigurationError)?;

        if snapshot.admin != config.admin {
            return Err(RegistryError::ConfigurationError(format!(
                "snapshot admin {} does not match configured admin {}",
                snapshot.admin, config.admin
            )));
        }

        let taken_at = snapshot.taken_at;
        let state = RegistryState::from_snapshot(snapshot)?;

        info!(
            taken_at = %taken_at,
            properties = state.properties.len(),
            agreements = state.agreements.len(),
            "Registry restored from snapshot"
        );

        let registry = Self::build(config, state, ledger, clock)?;
        let active = registry.state.lock().agreements.active_count() as u64;
        registry.metrics.set_agreements_active(active);
        Ok(registry)
    }

    fn build(
        config: RegistryConfig,
        state: RegistryState,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let day_unit = config.day_unit_chrono().map_err(RegistryError::ConfigurationError)?;
        info!(admin = %config.admin, day_unit_secs = config.day_unit.as_secs(), "Registry created");

        Ok(Self {
            engine: AgreementEngine::new(ledger.clone(), day_unit),
            events: EventBus::new(config.event_channel_capacity),
            state: Mutex::new(state),
            audit: Mutex::new(AuditTrail::new()),
            metrics: Arc::new(RegistryMetrics::new()),
            config,
            ledger,
            clock,
        })
    }

    /// The admin identity.
    pub fn admin(&self) -> &Identity {
        &self.config.admin
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a property owned by `caller`.
    #[instrument(skip(self, listing))]
    pub fn register_property(&self, caller: &Identity, listing: PropertyListing) -> Result<PropertyId> {
        let mut guard = self.state.lock();
        let now = self.clock.now();
        let state = &mut *guard;

        let price_per_day = listing.price_per_day;
        let security_deposit = listing.security_deposit;

        let result = state
            .properties
            .register(&mut state.counters.properties, caller.clone(), listing, now);
        let property_id = self.finish("register_property", result)?;

        self.metrics.property_registered();
        self.emit(
            vec![RegistryEvent::PropertyRegistered {
                property_id,
                owner: caller.clone(),
                price_per_day,
                security_deposit,
            }],
            now,
        );

        Ok(property_id)
    }

    /// Set a property's availability. Owner only.
    ///
    /// A property under an active agreement cannot be put back on the market;
    /// it becomes available again when its deposit is returned.
    #[instrument(skip(self))]
    pub fn update_property_availability(
        &self,
        caller: &Identity,
        property_id: PropertyId,
        is_available: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        let result = Self::apply_availability(&mut state, caller, property_id, is_available);
        self.finish("update_property_availability", result)?;

        self.metrics.availability_updated();
        self.emit(
            vec![RegistryEvent::PropertyAvailabilityUpdated {
                property_id,
                is_available,
            }],
            now,
        );

        Ok(())
    }

    fn apply_availability(
        state: &mut RegistryState,
        caller: &Identity,
        property_id: PropertyId,
        is_available: bool,
    ) -> Result<()> {
        if is_available {
            if let Some(agreement_id) = state.agreements.active_for_property(property_id) {
                if state.properties.get(property_id)?.is_owned_by(caller) {
                    return Err(RegistryError::RentalInProgress {
                        property_id,
                        agreement_id,
                    });
                }
            }
        }

        state
            .properties
            .set_availability(caller, property_id, is_available)
    }

    /// Rent a property for `[start, end)`. `paid` must equal the quoted total.
    #[instrument(skip(self))]
    pub fn create_rental_agreement(
        &self,
        caller: &Identity,
        property_id: PropertyId,
        start: Timestamp,
        end: Timestamp,
        paid: Amount,
    ) -> Result<AgreementId> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        let result = self
            .engine
            .create_agreement(&mut state, caller, property_id, start, end, paid, now);
        let created = self.finish("create_rental_agreement", result)?;

        self.metrics.agreement_created();
        self.emit(created.events(), now);

        Ok(created.agreement.id)
    }

    /// Pay a deposit back once the rental period has elapsed.
    /// Property owner or admin only.
    #[instrument(skip(self))]
    pub fn return_security_deposit(&self, caller: &Identity, agreement_id: AgreementId) -> Result<()> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        let result = self.engine.return_security_deposit(
            &mut state,
            caller,
            &self.config.admin,
            agreement_id,
            now,
        );
        let returned = self.finish("return_security_deposit", result)?;

        self.metrics.deposit_returned();
        self.emit(returned.events(), now);

        Ok(())
    }

    /// Move the entire custody balance to the admin. Admin only.
    ///
    /// Escrow holds are left untouched, so deposits still held can no longer
    /// be paid back until custody is refilled.
    #[instrument(skip(self))]
    pub fn recover_funds(&self, caller: &Identity) -> Result<Amount> {
        let state = self.state.lock();
        let now = self.clock.now();

        let result = self.drain_custody(&state, caller, now);
        let amount = self.finish("recover_funds", result)?;

        self.metrics.funds_recovered();
        self.emit(
            vec![RegistryEvent::FundsRecovered {
                admin: caller.clone(),
                amount,
            }],
            now,
        );

        Ok(amount)
    }

    fn drain_custody(&self, state: &RegistryState, caller: &Identity, now: Timestamp) -> Result<Amount> {
        if caller != &self.config.admin {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                action: "recover funds",
            });
        }

        let amount = self.ledger.custody_balance();
        let outstanding = state.escrow.total_held();
        if outstanding.is_positive() {
            warn!(
                outstanding = %outstanding,
                holds = state.escrow.active_hold_count(),
                "Recovering funds while deposits are held in escrow"
            );
        }

        let batch = TransferBatch::new(format!("recover:{}", now.timestamp_millis()))
            .pay_out(LedgerAccount::from(caller), amount);
        self.ledger.execute(&batch)?;

        warn!(admin = %caller, amount = %amount, "Custody drained to admin");
        Ok(amount)
    }

    /// Every property id ever issued, in issue order.
    pub fn get_all_properties(&self) -> Vec<PropertyId> {
        self.state.lock().properties.all_ids().to_vec()
    }

    pub fn get_properties_by_owner(&self, owner: &Identity) -> Vec<PropertyId> {
        self.state.lock().properties.list_by_owner(owner).to_vec()
    }

    pub fn get_rentals_by_tenant(&self, tenant: &Identity) -> Vec<AgreementId> {
        self.state.lock().agreements.list_by_tenant(tenant).to_vec()
    }

    pub fn get_property_details(&self, property_id: PropertyId) -> Result<Property> {
        self.state.lock().properties.get(property_id).cloned()
    }

    pub fn get_rental_agreement_details(&self, agreement_id: AgreementId) -> Result<RentalAgreement> {
        self.state.lock().agreements.get(agreement_id).cloned()
    }

    /// Price a rental at the current time without creating it.
    pub fn quote(&self, property_id: PropertyId, start: Timestamp, end: Timestamp) -> Result<RentalQuote> {
        let state = self.state.lock();
        let now = self.clock.now();
        self.engine.quote(&state, property_id, start, end, now)
    }

    /// Deposit still held for an agreement.
    pub fn escrowed_for(&self, agreement_id: AgreementId) -> Result<Amount> {
        let state = self.state.lock();
        state.agreements.get(agreement_id)?;
        Ok(state.escrow.held_for(agreement_id))
    }

    /// Sum of all deposits still held.
    pub fn total_escrowed(&self) -> Amount {
        self.state.lock().escrow.total_held()
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    /// Copy of the audit trail.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit.lock().records().to_vec()
    }

    pub fn audit_for_property(&self, property_id: PropertyId) -> Vec<AuditRecord> {
        self.audit
            .lock()
            .for_property(property_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Check the audit chain. Returns the index of the first broken record.
    pub fn verify_audit(&self) -> std::result::Result<(), usize> {
        self.audit.lock().verify()
    }

    /// Capture the full registry state.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock();
        state.snapshot(&self.config.admin, self.clock.now())
    }

    fn finish<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.operation_failed(e.is_external());
            warn!(operation, code = e.error_code(), error = %e, "Operation rejected");
        }
        result
    }

    fn emit(&self, events: Vec<RegistryEvent>, now: Timestamp) {
        for event in events {
            let envelope = self.events.publish(event, now);
            self.metrics.event_emitted();
            if self.config.audit_enabled {
                self.audit.lock().append(envelope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rentescrow_common::ManualClock;
    use rentescrow_ledger::InMemoryLedger;

    struct Harness {
        registry: Registry,
        ledger: Arc<InMemoryLedger>,
        clock: Arc<ManualClock>,
        owner: Identity,
        tenant: Identity,
        admin: Identity,
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let tenant = Identity::new("tenant");
        ledger.fund(&tenant, Amount::from(10_000u64)).unwrap();

        let registry = Registry::new(
            RegistryConfig::with_admin("admin"),
            ledger.clone(),
            clock.clone(),
        )
        .unwrap();

        Harness {
            registry,
            ledger,
            clock,
            owner: Identity::new("owner"),
            tenant,
            admin: Identity::new("admin"),
        }
    }

    fn listing() -> PropertyListing {
        PropertyListing::new("Harbour flat", Amount::from(100u64), Amount::from(500u64))
            .with_location("Porto")
    }

    fn rent(h: &Harness, property_id: PropertyId, paid: u64) -> Result<AgreementId> {
        h.registry.create_rental_agreement(
            &h.tenant,
            property_id,
            t0() + Duration::days(1),
            t0() + Duration::days(4),
            Amount::from(paid),
        )
    }

    #[test]
    fn test_full_rental_scenario() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();

        for paid in [799, 801] {
            let err = rent(&h, property_id, paid).unwrap_err();
            assert_eq!(err.error_code(), "PAYMENT_MISMATCH");
        }

        let agreement_id = rent(&h, property_id, 800).unwrap();
        assert!(!h.registry.get_property_details(property_id).unwrap().is_available);
        assert_eq!(h.ledger.balance_of(&LedgerAccount::from(&h.owner)), Amount::from(300u64));
        assert_eq!(h.registry.escrowed_for(agreement_id).unwrap(), Amount::from(500u64));

        let agreement = h.registry.get_rental_agreement_details(agreement_id).unwrap();
        assert_eq!(agreement.rental_days, 3);
        assert_eq!(agreement.total_amount, Amount::from(800u64));

        h.clock.advance(Duration::days(2));
        let err = h.registry.return_security_deposit(&h.owner, agreement_id).unwrap_err();
        assert_eq!(err.error_code(), "TOO_EARLY");

        h.clock.set(t0() + Duration::days(4) + Duration::seconds(1));
        h.registry.return_security_deposit(&h.owner, agreement_id).unwrap();
        assert!(h.registry.get_property_details(property_id).unwrap().is_available);
        assert_eq!(h.ledger.balance_of(&LedgerAccount::from(&h.tenant)), Amount::from(9_700u64));
        assert_eq!(h.ledger.custody_balance(), Amount::ZERO);

        let err = h.registry.return_security_deposit(&h.owner, agreement_id).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyReturned(agreement_id));

        assert!(h.ledger.verify_integrity());
        assert_eq!(h.registry.verify_audit(), Ok(()));
    }

    #[test]
    fn test_deposit_return_exactly_at_end_is_too_early() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        let agreement_id = rent(&h, property_id, 800).unwrap();

        h.clock.set(t0() + Duration::days(4));
        let err = h.registry.return_security_deposit(&h.admin, agreement_id).unwrap_err();
        assert_eq!(err.error_code(), "TOO_EARLY");

        h.clock.advance(Duration::milliseconds(1));
        h.registry.return_security_deposit(&h.admin, agreement_id).unwrap();
    }

    #[test]
    fn test_rented_property_not_available() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        rent(&h, property_id, 800).unwrap();

        let err = rent(&h, property_id, 800).unwrap_err();
        assert_eq!(err, RegistryError::NotAvailable(property_id));
        assert_eq!(h.registry.get_rentals_by_tenant(&h.tenant).len(), 1);
    }

    #[test]
    fn test_sequential_ids() {
        let h = harness();
        let ids: Vec<u64> = (0..3)
            .map(|_| h.registry.register_property(&h.owner, listing()).unwrap().value())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(h.registry.get_all_properties().len(), 3);
        assert_eq!(h.registry.get_properties_by_owner(&h.owner).len(), 3);
        assert!(h.registry.get_properties_by_owner(&h.tenant).is_empty());
    }

    #[test]
    fn test_availability_updates() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();

        h.registry.update_property_availability(&h.owner, property_id, true).unwrap();
        h.registry.update_property_availability(&h.owner, property_id, true).unwrap();
        assert!(h.registry.get_property_details(property_id).unwrap().is_available);

        let err = h
            .registry
            .update_property_availability(&h.tenant, property_id, false)
            .unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        h.registry.update_property_availability(&h.owner, property_id, false).unwrap();
        assert_eq!(rent(&h, property_id, 800).unwrap_err().error_code(), "NOT_AVAILABLE");
    }

    #[test]
    fn test_cannot_relist_while_rented() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        let agreement_id = rent(&h, property_id, 800).unwrap();

        let err = h
            .registry
            .update_property_availability(&h.owner, property_id, true)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::RentalInProgress {
                property_id,
                agreement_id,
            }
        );

        // Delisting a rented property is harmless.
        h.registry.update_property_availability(&h.owner, property_id, false).unwrap();
    }

    #[test]
    fn test_ledger_refusal_rolls_back() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        h.ledger.freeze(LedgerAccount::from(&h.owner));

        let err = rent(&h, property_id, 800).unwrap_err();
        assert_eq!(err.error_code(), "TRANSFER_FAILED");
        assert!(h.registry.get_property_details(property_id).unwrap().is_available);
        assert!(h.registry.get_rentals_by_tenant(&h.tenant).is_empty());
        assert_eq!(h.registry.total_escrowed(), Amount::ZERO);
        assert_eq!(h.registry.metrics().snapshot().transfers_failed, 1);

        h.ledger.unfreeze(&LedgerAccount::from(&h.owner));
        assert_eq!(rent(&h, property_id, 800).unwrap().value(), 1);
    }

    #[test]
    fn test_unknown_ids() {
        let h = harness();
        let err = h.registry.get_property_details(PropertyId::new(1)).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        let err = h
            .registry
            .return_security_deposit(&h.admin, AgreementId::new(1))
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_recover_funds() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        rent(&h, property_id, 800).unwrap();

        let err = h.registry.recover_funds(&h.owner).unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        let amount = h.registry.recover_funds(&h.admin).unwrap();
        assert_eq!(amount, Amount::from(500u64));
        assert_eq!(h.ledger.balance_of(&LedgerAccount::from(&h.admin)), Amount::from(500u64));
        assert_eq!(h.ledger.custody_balance(), Amount::ZERO);

        // Holds are untouched, and an empty custody drains to zero.
        assert_eq!(h.registry.total_escrowed(), Amount::from(500u64));
        assert_eq!(h.registry.recover_funds(&h.admin).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_events_in_order() {
        let h = harness();
        let mut events = h.registry.subscribe();

        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        h.registry.update_property_availability(&h.owner, property_id, true).unwrap();
        rent(&h, property_id, 800).unwrap();

        let names: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.event.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "PropertyRegistered",
                "PropertyAvailabilityUpdated",
                "RentalAgreementCreated",
                "PaymentProcessed",
            ]
        );

        // Failed operations emit nothing.
        assert!(rent(&h, property_id, 800).is_err());
        assert!(events.try_recv().is_err());
        assert_eq!(h.registry.audit_for_property(property_id).len(), 4);
    }

    #[test]
    fn test_snapshot_restore_keeps_counters() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        let agreement_id = rent(&h, property_id, 800).unwrap();

        let snapshot = h.registry.snapshot();
        let restored = Registry::restore(
            RegistryConfig::with_admin("admin"),
            snapshot.clone(),
            h.ledger.clone(),
            h.clock.clone(),
        )
        .unwrap();

        assert_eq!(restored.metrics().snapshot().agreements_active, 1);
        let next = restored.register_property(&h.owner, listing()).unwrap();
        assert_eq!(next.value(), 2);

        h.clock.set(t0() + Duration::days(5));
        restored.return_security_deposit(&h.owner, agreement_id).unwrap();
        assert!(restored.get_property_details(property_id).unwrap().is_available);

        let err = Registry::restore(
            RegistryConfig::with_admin("someone-else"),
            snapshot,
            h.ledger.clone(),
            h.clock.clone(),
        )
        .err()
        .unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_concurrent_bookings_single_winner() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        let tenants: Vec<Identity> = (0..8).map(|i| Identity::new(format!("tenant-{}", i))).collect();
        for tenant in &tenants {
            h.ledger.fund(tenant, Amount::from(800u64)).unwrap();
        }

        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = tenants
                .iter()
                .map(|tenant| {
                    let registry = &h.registry;
                    scope.spawn(move || {
                        registry
                            .create_rental_agreement(
                                tenant,
                                property_id,
                                t0() + Duration::days(1),
                                t0() + Duration::days(4),
                                Amount::from(800u64),
                            )
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(false))
                .filter(|won| *won)
                .count()
        });

        assert_eq!(winners, 1);
        assert_eq!(h.registry.total_escrowed(), Amount::from(500u64));
        assert!(h.ledger.verify_integrity());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
        let err = Registry::new(RegistryConfig::with_admin(""), ledger.clone(), clock.clone())
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

        let mut config = RegistryConfig::with_admin("admin");
        config.event_channel_capacity = usize::MAX;
        let err = Registry::new(config, ledger.clone(), clock.clone()).err().unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

        let mut config = RegistryConfig::with_admin("admin");
        config.day_unit = std::time::Duration::from_secs(u64::MAX);
        let err = Registry::new(config, ledger, clock).err().unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_zero_deposit_rental() {
        let h = harness();
        let listing = PropertyListing::new("Garden shed", Amount::from(100u64), Amount::ZERO);
        let property_id = h.registry.register_property(&h.owner, listing).unwrap();

        let agreement_id = rent(&h, property_id, 300).unwrap();
        assert_eq!(h.ledger.custody_balance(), Amount::ZERO);
        assert_eq!(h.registry.escrowed_for(agreement_id).unwrap(), Amount::ZERO);
        assert!(!h.registry.get_property_details(property_id).unwrap().is_available);
        assert_eq!(h.ledger.balance_of(&LedgerAccount::from(&h.owner)), Amount::from(300u64));

        h.clock.set(t0() + Duration::days(5));
        h.registry.return_security_deposit(&h.owner, agreement_id).unwrap();
        assert!(h.registry.get_property_details(property_id).unwrap().is_available);
        assert_eq!(h.ledger.balance_of(&LedgerAccount::from(&h.tenant)), Amount::from(9_700u64));

        let err = h.registry.return_security_deposit(&h.owner, agreement_id).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyReturned(agreement_id));
        assert!(h.ledger.verify_integrity());
    }

    #[test]
    fn test_agreement_ids_not_reused_after_close() {
        let h = harness();
        let property_id = h.registry.register_property(&h.owner, listing()).unwrap();
        let first = rent(&h, property_id, 800).unwrap();
        assert_eq!(first.value(), 1);

        h.clock.set(t0() + Duration::days(5));
        h.registry.return_security_deposit(&h.admin, first).unwrap();

        let second = h
            .registry
            .create_rental_agreement(
                &h.tenant,
                property_id,
                t0() + Duration::days(6),
                t0() + Duration::days(9),
                Amount::from(800u64),
            )
            .unwrap();
        assert_eq!(second.value(), 2);
        assert!(h.registry.get_rental_agreement_details(first).unwrap().security_deposit_returned);
        assert_eq!(h.registry.get_rentals_by_tenant(&h.tenant), vec![first, second]);
    }
}
