//! Property and rental agreement records.

use crate::{AgreementId, Amount, Identity, PropertyId, Timestamp};
use serde::{Deserialize, Serialize};

/// Listing data supplied when registering a property.
///
/// Text fields are opaque; empty strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyListing {
    pub title: String,
    pub description: String,
    pub location: String,
    /// Daily price in the smallest currency unit. Must be positive.
    pub price_per_day: Amount,
    /// Security deposit held in escrow for each agreement. May be zero.
    pub security_deposit: Amount,
}

impl PropertyListing {
    /// Create a listing with pricing only.
    pub fn new(title: impl Into<String>, price_per_day: Amount, security_deposit: Amount) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            location: String::new(),
            price_per_day,
            security_deposit,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// A registered rental property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Sequential property identifier.
    pub id: PropertyId,
    /// Registering caller. Immutable.
    pub owner: Identity,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price_per_day: Amount,
    pub security_deposit: Amount,
    /// False while an active agreement references the property.
    pub is_available: bool,
    /// When the property was registered.
    pub registered_at: Timestamp,
}

impl Property {
    /// Create a newly registered, available property.
    pub fn new(id: PropertyId, owner: Identity, listing: PropertyListing, now: Timestamp) -> Self {
        Self {
            id,
            owner,
            title: listing.title,
            description: listing.description,
            location: listing.location,
            price_per_day: listing.price_per_day,
            security_deposit: listing.security_deposit,
            is_available: true,
            registered_at: now,
        }
    }

    /// Check if `caller` owns this property.
    pub fn is_owned_by(&self, caller: &Identity) -> bool {
        &self.owner == caller
    }
}

/// Agreement lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    /// Active; security deposit held in escrow.
    Created,
    /// Deposit returned. Terminal.
    Closed,
}

impl AgreementStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, AgreementStatus::Closed)
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[AgreementStatus] {
        match self {
            AgreementStatus::Created => &[AgreementStatus::Closed],
            AgreementStatus::Closed => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: AgreementStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// A rental agreement binding one tenant to one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalAgreement {
    /// Sequential agreement identifier.
    pub id: AgreementId,
    pub property_id: PropertyId,
    /// Creating caller. Immutable.
    pub tenant: Identity,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    /// Whole days between start and end, at least 1.
    pub rental_days: u64,
    /// Rent plus security deposit, fixed at creation.
    pub total_amount: Amount,
    /// Copied from the property at creation.
    pub security_deposit: Amount,
    pub is_active: bool,
    pub security_deposit_returned: bool,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl RentalAgreement {
    /// Current lifecycle state.
    pub fn status(&self) -> AgreementStatus {
        if self.is_active {
            AgreementStatus::Created
        } else {
            AgreementStatus::Closed
        }
    }

    /// Rent portion of the total (forwarded to the owner at creation).
    pub fn total_rent(&self) -> Amount {
        self.total_amount
            .checked_sub(self.security_deposit)
            .unwrap_or(Amount::ZERO)
    }

    /// Close the agreement after the deposit has been returned.
    pub fn close(&mut self, at: Timestamp) -> Result<(), InvalidTransition> {
        let from = self.status();
        if !from.can_transition_to(AgreementStatus::Closed) || self.security_deposit_returned {
            return Err(InvalidTransition {
                from,
                to: AgreementStatus::Closed,
            });
        }

        self.security_deposit_returned = true;
        self.is_active = false;
        self.closed_at = Some(at);
        Ok(())
    }
}

/// Error when attempting invalid state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: AgreementStatus,
    pub to: AgreementStatus,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid state transition from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl std::error::Error for InvalidTransition {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn create_test_agreement() -> RentalAgreement {
        let now = Utc::now();
        RentalAgreement {
            id: AgreementId::new(1),
            property_id: PropertyId::new(1),
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
        }
    }

    #[test]
    fn test_agreement_close_once() {
        let mut agreement = create_test_agreement();
        assert_eq!(agreement.status(), AgreementStatus::Created);
        assert_eq!(agreement.total_rent(), Amount::from(300u64));

        agreement.close(Utc::now()).unwrap();
        assert_eq!(agreement.status(), AgreementStatus::Closed);
        assert!(agreement.security_deposit_returned);
        assert!(!agreement.is_active);
        assert!(agreement.closed_at.is_some());

        assert!(agreement.close(Utc::now()).is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(AgreementStatus::Created.can_transition_to(AgreementStatus::Closed));
        assert!(!AgreementStatus::Closed.can_transition_to(AgreementStatus::Created));
        assert!(AgreementStatus::Closed.is_final());
        assert!(!AgreementStatus::Created.is_final());
    }

    #[test]
    fn test_property_from_listing() {
        let listing = PropertyListing::new("Loft", Amount::from(100u64), Amount::ZERO)
            .with_location("Lisbon");
        let property = Property::new(PropertyId::new(1), Identity::new("owner"), listing, Utc::now());

        assert!(property.is_available);
        assert!(property.is_owned_by(&Identity::new("owner")));
        assert!(!property.is_owned_by(&Identity::new("someone")));
        assert_eq!(property.location, "Lisbon");
        assert_eq!(property.description, "");
    }
}
