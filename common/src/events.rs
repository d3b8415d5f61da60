//! Notifications emitted by the registry for external observers.

use crate::{AgreementId, Amount, EventId, Identity, PropertyId, Timestamp};
use serde::{Deserialize, Serialize};

/// A registry event. Fire-and-forget; never consumed internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryEvent {
    PropertyRegistered {
        property_id: PropertyId,
        owner: Identity,
        price_per_day: Amount,
        security_deposit: Amount,
    },
    PropertyAvailabilityUpdated {
        property_id: PropertyId,
        is_available: bool,
    },
    RentalAgreementCreated {
        agreement_id: AgreementId,
        property_id: PropertyId,
        tenant: Identity,
        start_date: Timestamp,
        end_date: Timestamp,
        total_amount: Amount,
    },
    PaymentProcessed {
        agreement_id: AgreementId,
        payer: Identity,
        recipient: Identity,
        amount: Amount,
    },
    SecurityDepositReturned {
        agreement_id: AgreementId,
        tenant: Identity,
        amount: Amount,
    },
    FundsRecovered {
        admin: Identity,
        amount: Amount,
    },
}

impl RegistryEvent {
    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::PropertyRegistered { .. } => "PropertyRegistered",
            RegistryEvent::PropertyAvailabilityUpdated { .. } => "PropertyAvailabilityUpdated",
            RegistryEvent::RentalAgreementCreated { .. } => "RentalAgreementCreated",
            RegistryEvent::PaymentProcessed { .. } => "PaymentProcessed",
            RegistryEvent::SecurityDepositReturned { .. } => "SecurityDepositReturned",
            RegistryEvent::FundsRecovered { .. } => "FundsRecovered",
        }
    }

    /// Property this event concerns, if it names one directly.
    pub fn property_id(&self) -> Option<PropertyId> {
        match self {
            RegistryEvent::PropertyRegistered { property_id, .. }
            | RegistryEvent::PropertyAvailabilityUpdated { property_id, .. }
            | RegistryEvent::RentalAgreementCreated { property_id, .. } => Some(*property_id),
            _ => None,
        }
    }

    /// Agreement this event concerns, if any.
    pub fn agreement_id(&self) -> Option<AgreementId> {
        match self {
            RegistryEvent::RentalAgreementCreated { agreement_id, .. }
            | RegistryEvent::PaymentProcessed { agreement_id, .. }
            | RegistryEvent::SecurityDepositReturned { agreement_id, .. } => Some(*agreement_id),
            _ => None,
        }
    }
}

/// An emitted event with delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    /// Position in the registry's emission order, starting at 1.
    pub sequence: u64,
    pub emitted_at: Timestamp,
    pub event: RegistryEvent,
}
