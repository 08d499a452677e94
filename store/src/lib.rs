//! Innkeep Store
//!
//! The durable-store seam of the reservation core. A [`ReservationStore`]
//! hands out [`UnitOfWork`]s, each bound to one pooled connection and one
//! transaction. Row locks taken inside a unit of work are held until it
//! commits, rolls back or is dropped.
//!
//! Two implementations are provided:
//!
//! - [`PgReservationStore`]: PostgreSQL via `sqlx`, locking with
//!   `SELECT ... FOR UPDATE` under a per-transaction `lock_timeout`
//! - [`MemoryStore`]: in-process tables with emulated row locks, a bounded
//!   connection pool and fault injection, used by tests and the simulator

pub mod config;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod unit_of_work;

pub use config::StoreConfig;
pub use memory::{FaultPoint, MemoryStore, MemoryUnitOfWork};
pub use postgres::{PgReservationStore, PgUnitOfWork};
pub use unit_of_work::{ReservationStore, UnitOfWork};
