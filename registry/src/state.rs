//! Registry state and its persisted form.

use serde::{Deserialize, Serialize};

use rentescrow_common::{
    IdSequence, Identity, Property, RegistryError, RentalAgreement, Result, Timestamp,
};

use crate::agreement_engine::AgreementBook;
use crate::escrow::{EscrowBook, EscrowHold};
use crate::property_store::PropertyStore;

/// Id counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub properties: IdSequence,
    pub agreements: IdSequence,
}

/// Everything the registry stores. Mutated only under the registry lock.
#[derive(Debug, Default)]
pub struct RegistryState {
    pub counters: Counters,
    pub properties: PropertyStore,
    pub agreements: AgreementBook,
    pub escrow: EscrowBook,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the full state.
    pub fn snapshot(&self, admin: &Identity, taken_at: Timestamp) -> RegistrySnapshot {
        RegistrySnapshot {
            admin: admin.clone(),
            counters: self.counters,
            properties: self.properties.records(),
            agreements: self.agreements.records(),
            escrow: self.escrow.holds(),
            taken_at,
        }
    }

    /// Rebuild state from a snapshot, checking that it is internally
    /// consistent.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self> {
        snapshot.check()?;

        Ok(Self {
            counters: snapshot.counters,
            properties: PropertyStore::from_records(snapshot.properties),
            agreements: AgreementBook::from_records(snapshot.agreements),
            escrow: EscrowBook::from_holds(snapshot.escrow),
        })
    }
}

/// Serializable copy of the registry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub admin: Identity,
    pub counters: Counters,
    pub properties: Vec<Property>,
    pub agreements: Vec<RentalAgreement>,
    pub escrow: Vec<EscrowHold>,
    pub taken_at: Timestamp,
}

impl RegistrySnapshot {
    fn check(&self) -> Result<()> {
        let corrupt = |msg: String| Err(RegistryError::ConfigurationError(format!("corrupt snapshot: {}", msg)));

        for property in &self.properties {
            if property.id.value() == 0 || property.id.value() > self.counters.properties.last() {
                return corrupt(format!("property {} outside issued range", property.id));
            }
        }

        for agreement in &self.agreements {
            if agreement.id.value() == 0 || agreement.id.value() > self.counters.agreements.last() {
                return corrupt(format!("agreement {} outside issued range", agreement.id));
            }

            let property = match self.properties.iter().find(|p| p.id == agreement.property_id) {
                Some(property) => property,
                None => {
                    return corrupt(format!(
                        "agreement {} references unknown property {}",
                        agreement.id, agreement.property_id
                    ))
                }
            };

            if agreement.is_active && property.is_available {
                return corrupt(format!(
                    "property {} is available under active agreement {}",
                    property.id, agreement.id
                ));
            }

            if agreement.is_active == agreement.security_deposit_returned {
                return corrupt(format!("agreement {} has inconsistent flags", agreement.id));
            }
        }

        let active = self.agreements.iter().filter(|a| a.is_active);
        for agreement in active.clone() {
            let rented = active
                .clone()
                .filter(|a| a.property_id == agreement.property_id)
                .count();
            if rented > 1 {
                return corrupt(format!(
                    "property {} has {} active agreements",
                    agreement.property_id, rented
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rentescrow_common::{AgreementId, Amount, PropertyId, PropertyListing};

    fn populated() -> RegistryState {
        let mut state = RegistryState::new();
        let now = Utc::now();
        let property_id = state
            .properties
            .register(
                &mut state.counters.properties,
                Identity::new("owner"),
                PropertyListing::new("Flat", Amount::from(100u64), Amount::from(500u64)),
                now,
            )
            .unwrap();

        let id = AgreementId::new(state.counters.agreements.next().unwrap());
        state.agreements.insert(RentalAgreement {
            id,
            property_id,
            tenant: Identity::new("tenant"),
            start_date: now + Duration::days(1),
            end_date: now + Duration::days(4),
            rental_days: 3,
            total_amount: Amount::from(800u64),
            security_deposit: Amount::from(500u64),
            is_active: true,
            security_deposit_returned: false,
            created_at: now,
            closed_at: None,
        });
        state
            .escrow
            .place_hold(id, property_id, Identity::new("tenant"), Amount::from(500u64), now);
        state.properties.mark_unavailable(property_id).unwrap();
        state
    }

    #[test]
    fn test_snapshot_restore() {
        let state = populated();
        let snapshot = state.snapshot(&Identity::new("admin"), Utc::now());

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: RegistrySnapshot = serde_json::from_str(&json).unwrap();
        let restored = RegistryState::from_snapshot(parsed).unwrap();

        assert_eq!(restored.counters, state.counters);
        assert_eq!(restored.properties.all_ids(), state.properties.all_ids());
        assert_eq!(
            restored.agreements.list_by_tenant(&Identity::new("tenant")),
            &[AgreementId::new(1)]
        );
        assert_eq!(restored.escrow.total_held(), Amount::from(500u64));
        assert_eq!(
            restored.agreements.active_for_property(PropertyId::new(1)),
            Some(AgreementId::new(1))
        );
    }

    #[test]
    fn test_restore_rejects_ids_beyond_counter() {
        let state = populated();
        let mut snapshot = state.snapshot(&Identity::new("admin"), Utc::now());
        snapshot.counters.properties = IdSequence::new();

        let err = RegistryState::from_snapshot(snapshot).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_restore_rejects_available_rented_property() {
        let state = populated();
        let mut snapshot = state.snapshot(&Identity::new("admin"), Utc::now());
        snapshot.properties[0].is_available = true;

        assert!(RegistryState::from_snapshot(snapshot).is_err());
    }
}
