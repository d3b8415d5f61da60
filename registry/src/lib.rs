//! RentEscrow Registry
//!
//! The registry tracks rental property listings, binds tenants to owners via
//! time-bounded agreements and escrows security deposits until the rental
//! period has elapsed. All mutations are serialized through one registry-wide
//! lock and either commit completely or leave state untouched.

pub mod registry;
pub mod config;
pub mod property_store;
pub mod agreement_engine;
pub mod escrow;
pub mod txn;
pub mod state;
pub mod events;
pub mod audit;
pub mod metrics;

pub use registry::Registry;
pub use config::{LogFormat, RegistryConfig};
pub use property_store::PropertyStore;
pub use agreement_engine::{AgreementBook, AgreementEngine, RentalQuote};
pub use escrow::{EscrowBook, EscrowHold, HoldStatus};
pub use state::{RegistrySnapshot, RegistryState};
pub use events::{EventBus, EventHandler, LoggingHandler};
pub use audit::AuditTrail;
pub use metrics::RegistryMetrics;
