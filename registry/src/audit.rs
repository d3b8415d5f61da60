//! Hash-chained audit trail of emitted events.
//!
//! Each record commits to the previous record's hash and the serialized
//! envelope, so editing or dropping any record breaks every later link.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use rentescrow_common::{AgreementId, EventEnvelope, PropertyId, RegistryEvent};

/// Hash preceding the first record.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One link in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub envelope: EventEnvelope,
    pub prev_hash: String,
    pub hash: String,
}

/// Append-only audit trail.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: Vec<AuditRecord>,
    by_property: HashMap<PropertyId, Vec<usize>>,
    by_agreement: HashMap<AgreementId, Vec<usize>>,
    property_of: HashMap<AgreementId, PropertyId>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the newest record, or [`GENESIS_HASH`].
    pub fn head_hash(&self) -> &str {
        self.records
            .last()
            .map(|r| r.hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    /// Append an envelope to the chain.
    pub fn append(&mut self, envelope: EventEnvelope) -> &AuditRecord {
        let prev_hash = self.head_hash().to_string();
        let hash = chain_hash(&prev_hash, &envelope);
        let index = self.records.len();

        if let RegistryEvent::RentalAgreementCreated {
            agreement_id,
            property_id,
            ..
        } = &envelope.event
        {
            self.property_of.insert(*agreement_id, *property_id);
        }

        let agreement_id = envelope.event.agreement_id();
        let property_id = envelope
            .event
            .property_id()
            .or_else(|| agreement_id.and_then(|id| self.property_of.get(&id).copied()));

        if let Some(id) = property_id {
            self.by_property.entry(id).or_default().push(index);
        }
        if let Some(id) = agreement_id {
            self.by_agreement.entry(id).or_default().push(index);
        }

        self.records.push(AuditRecord {
            envelope,
            prev_hash,
            hash,
        });
        &self.records[index]
    }

    /// Recompute every link. Returns the index of the first broken record.
    pub fn verify(&self) -> Result<(), usize> {
        let mut prev = GENESIS_HASH.to_string();
        for (index, record) in self.records.iter().enumerate() {
            if record.prev_hash != prev || chain_hash(&prev, &record.envelope) != record.hash {
                return Err(index);
            }
            prev = record.hash.clone();
        }
        Ok(())
    }

    /// Records touching a property, including its agreements' payments.
    pub fn for_property(&self, id: PropertyId) -> Vec<&AuditRecord> {
        self.collect(self.by_property.get(&id))
    }

    pub fn for_agreement(&self, id: AgreementId) -> Vec<&AuditRecord> {
        self.collect(self.by_agreement.get(&id))
    }

    fn collect(&self, indices: Option<&Vec<usize>>) -> Vec<&AuditRecord> {
        indices
            .map(|ix| ix.iter().map(|i| &self.records[*i]).collect())
            .unwrap_or_default()
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn chain_hash(prev_hash: &str, envelope: &EventEnvelope) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(serde_json::to_vec(envelope).unwrap_or_default());
    let digest: [u8; 32] = hasher.finalize().into();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rentescrow_common::{Amount, EventId, Identity};

    fn envelope(sequence: u64, event: RegistryEvent) -> EventEnvelope {
        EventEnvelope {
            id: EventId::new(),
            sequence,
            emitted_at: Utc::now(),
            event,
        }
    }

    fn populated() -> AuditTrail {
        let mut trail = AuditTrail::new();
        trail.append(envelope(
            1,
            RegistryEvent::PropertyRegistered {
                property_id: PropertyId::new(1),
                owner: Identity::new("owner"),
                price_per_day: Amount::from(100u64),
                security_deposit: Amount::from(500u64),
            },
        ));
        trail.append(envelope(
            2,
            RegistryEvent::RentalAgreementCreated {
                agreement_id: AgreementId::new(1),
                property_id: PropertyId::new(1),
                tenant: Identity::new("tenant"),
                start_date: Utc::now(),
                end_date: Utc::now(),
                total_amount: Amount::from(800u64),
            },
        ));
        trail.append(envelope(
            3,
            RegistryEvent::PaymentProcessed {
                agreement_id: AgreementId::new(1),
                payer: Identity::new("tenant"),
                recipient: Identity::new("owner"),
                amount: Amount::from(300u64),
            },
        ));
        trail
    }

    #[test]
    fn test_chain_links() {
        let trail = populated();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.records()[0].prev_hash, GENESIS_HASH);
        assert_eq!(trail.records()[1].prev_hash, trail.records()[0].hash);
        assert_eq!(trail.head_hash(), trail.records()[2].hash);
        assert_eq!(trail.verify(), Ok(()));
    }

    #[test]
    fn test_tampering_detected() {
        let mut trail = populated();
        if let RegistryEvent::PaymentProcessed { amount, .. } = &mut trail.records[2].envelope.event {
            *amount = Amount::from(1u64);
        }
        assert_eq!(trail.verify(), Err(2));
    }

    #[test]
    fn test_payment_indexed_under_property() {
        let trail = populated();
        assert_eq!(trail.for_property(PropertyId::new(1)).len(), 3);
        assert_eq!(trail.for_agreement(AgreementId::new(1)).len(), 2);
        assert!(trail.for_property(PropertyId::new(2)).is_empty());
    }
}
