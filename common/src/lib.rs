//! RentEscrow Common Types
//!
//! This crate contains shared types used across the RentEscrow registry,
//! including identifiers, amounts, rental records, events and the clock
//! collaborator.

pub mod identifiers;
pub mod monetary;
pub mod rental;
pub mod events;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use rental::*;
pub use events::*;
pub use error::*;
pub use time::*;
