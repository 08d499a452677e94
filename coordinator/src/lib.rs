//! Innkeep Coordinator
//!
//! The reservation coordinator turns reserve and cancel requests into single
//! units of work against a [`innkeep_store::ReservationStore`]. It guarantees
//! that no two confirmed bookings of one room overlap, that a booking and its
//! payment are written together or not at all, and that every connection it
//! acquires is released.

pub mod coordinator;
pub mod config;
pub mod metrics;
pub mod retry;

pub use coordinator::{Cancellation, Reservation, ReservationCoordinator, ReserveRequest};
pub use config::{CoordinatorConfig, RetryConfig};
pub use metrics::{Metrics, MetricsSnapshot, SharedMetrics};
pub use retry::RetryPolicy;
