//! Event publication.
//!
//! Events are fire-and-forget: the registry publishes to a broadcast channel
//! and never waits on subscribers. A slow subscriber loses the oldest events
//! and is told how many it missed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use rentescrow_common::{EventEnvelope, EventId, RegistryEvent, Timestamp};

/// Broadcast channel for registry events.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sequence number of the last published event (0 if none).
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Wrap and publish an event.
    pub fn publish(&self, event: RegistryEvent, now: Timestamp) -> EventEnvelope {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = EventEnvelope {
            id: EventId::new(),
            sequence,
            emitted_at: now,
            event,
        };

        match self.sender.send(envelope.clone()) {
            Ok(receivers) => {
                debug!(sequence, event = envelope.event.name(), receivers, "Event published")
            }
            Err(_) => debug!(sequence, event = envelope.event.name(), "Event published without subscribers"),
        }

        envelope
    }
}

/// Consumer of published events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: EventEnvelope);
}

/// Handler that logs every event.
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, envelope: EventEnvelope) {
        match &envelope.event {
            RegistryEvent::PropertyRegistered {
                property_id,
                owner,
                price_per_day,
                security_deposit,
            } => {
                info!(
                    sequence = envelope.sequence,
                    property_id = %property_id,
                    owner = %owner,
                    price_per_day = %price_per_day,
                    security_deposit = %security_deposit,
                    "PropertyRegistered"
                );
            }
            RegistryEvent::PropertyAvailabilityUpdated {
                property_id,
                is_available,
            } => {
                info!(
                    sequence = envelope.sequence,
                    property_id = %property_id,
                    is_available,
                    "PropertyAvailabilityUpdated"
                );
            }
            RegistryEvent::RentalAgreementCreated {
                agreement_id,
                property_id,
                tenant,
                total_amount,
                ..
            } => {
                info!(
                    sequence = envelope.sequence,
                    agreement_id = %agreement_id,
                    property_id = %property_id,
                    tenant = %tenant,
                    total_amount = %total_amount,
                    "RentalAgreementCreated"
                );
            }
            RegistryEvent::PaymentProcessed {
                agreement_id,
                payer,
                recipient,
                amount,
            } => {
                info!(
                    sequence = envelope.sequence,
                    agreement_id = %agreement_id,
                    payer = %payer,
                    recipient = %recipient,
                    amount = %amount,
                    "PaymentProcessed"
                );
            }
            RegistryEvent::SecurityDepositReturned {
                agreement_id,
                tenant,
                amount,
            } => {
                info!(
                    sequence = envelope.sequence,
                    agreement_id = %agreement_id,
                    tenant = %tenant,
                    amount = %amount,
                    "SecurityDepositReturned"
                );
            }
            RegistryEvent::FundsRecovered { admin, amount } => {
                warn!(
                    sequence = envelope.sequence,
                    admin = %admin,
                    amount = %amount,
                    "FundsRecovered"
                );
            }
        }
    }
}

/// Feed events from `receiver` to `handler` until the bus is dropped.
/// Returns the number of events handled.
pub async fn run_event_pump<H>(mut receiver: broadcast::Receiver<EventEnvelope>, handler: Arc<H>) -> u64
where
    H: EventHandler + ?Sized,
{
    let mut handled = 0;

    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                handler.handle(envelope).await;
                handled += 1;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Event subscriber lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    debug!(handled, "Event pump stopped");
    handled
}
