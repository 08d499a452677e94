//! Innkeep Common Types
//!
//! This crate contains the types shared by the reservation store and
//! coordinator: identifiers, money, stay ranges, the persisted room, booking,
//! payment and audit-log rows, and the reservation error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod stay;
pub mod booking;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use stay::*;
pub use booking::*;
pub use error::*;
