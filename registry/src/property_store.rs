//! Property records and their owner index.

use std::collections::HashMap;

use tracing::{debug, info};

use rentescrow_common::{
    Entity, IdSequence, Identity, Property, PropertyId, PropertyListing, RegistryError, Result,
    Timestamp,
};

/// Registered properties, in registration order, plus a per-owner index.
#[derive(Debug, Default)]
pub struct PropertyStore {
    properties: HashMap<PropertyId, Property>,
    all: Vec<PropertyId>,
    by_owner: HashMap<Identity, Vec<PropertyId>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records. Indices are rebuilt in id order.
    pub fn from_records(mut records: Vec<Property>) -> Self {
        records.sort_by_key(|p| p.id);
        let mut store = Self::new();
        for property in records {
            store.insert(property);
        }
        store
    }

    fn insert(&mut self, property: Property) {
        self.all.push(property.id);
        self.by_owner
            .entry(property.owner.clone())
            .or_insert_with(Vec::new)
            .push(property.id);
        self.properties.insert(property.id, property);
    }

    /// Register a property for `owner`. The new property is available.
    pub fn register(
        &mut self,
        ids: &mut IdSequence,
        owner: Identity,
        listing: PropertyListing,
        now: Timestamp,
    ) -> Result<PropertyId> {
        if !listing.price_per_day.is_positive() {
            return Err(RegistryError::InvalidPrice);
        }

        let id = PropertyId::new(ids.next()?);
        let property = Property::new(id, owner, listing, now);

        info!(
            property_id = %id,
            owner = %property.owner,
            price_per_day = %property.price_per_day,
            security_deposit = %property.security_deposit,
            "Property registered"
        );

        self.insert(property);
        Ok(id)
    }

    /// Set the availability flag on behalf of `caller`.
    ///
    /// Only the owner may do this. Setting the current value again succeeds
    /// and changes nothing.
    pub fn set_availability(
        &mut self,
        caller: &Identity,
        id: PropertyId,
        is_available: bool,
    ) -> Result<()> {
        let property = self
            .properties
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(Entity::Property(id)))?;

        if !property.is_owned_by(caller) {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                action: "update property availability",
            });
        }

        if property.is_available != is_available {
            debug!(property_id = %id, is_available, "Availability changed by owner");
        }
        property.is_available = is_available;
        Ok(())
    }

    /// Get a property.
    pub fn get(&self, id: PropertyId) -> Result<&Property> {
        self.properties
            .get(&id)
            .ok_or(RegistryError::NotFound(Entity::Property(id)))
    }

    /// Ids registered by `owner`, in registration order.
    pub fn list_by_owner(&self, owner: &Identity) -> &[PropertyId] {
        self.by_owner
            .get(owner)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// All ids, in registration order.
    pub fn all_ids(&self) -> &[PropertyId] {
        &self.all
    }

    /// All properties, in registration order.
    pub fn records(&self) -> Vec<Property> {
        self.all
            .iter()
            .filter_map(|id| self.properties.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Take a property off the market for a new agreement.
    /// Returns the previous flag.
    pub(crate) fn mark_unavailable(&mut self, id: PropertyId) -> Result<bool> {
        self.replace_availability(id, false)
    }

    /// Put a property back on the market after its agreement closed.
    /// Returns the previous flag.
    pub(crate) fn mark_available(&mut self, id: PropertyId) -> Result<bool> {
        self.replace_availability(id, true)
    }

    pub(crate) fn restore_availability(&mut self, id: PropertyId, was_available: bool) {
        if let Some(property) = self.properties.get_mut(&id) {
            property.is_available = was_available;
        }
    }

    fn replace_availability(&mut self, id: PropertyId, value: bool) -> Result<bool> {
        let property = self
            .properties
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(Entity::Property(id)))?;
        Ok(std::mem::replace(&mut property.is_available, value))
    }
}
