//! Metrics collection for coordinator monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use innkeep_common::ReservationError;

/// Coordinator metrics.
pub struct Metrics {
    /// Reservation attempts.
    pub reservations_total: AtomicU64,
    /// Reservations committed.
    pub reservations_confirmed: AtomicU64,
    /// Reservations rejected because the dates were taken.
    pub reservations_conflicted: AtomicU64,
    /// Cancellation attempts.
    pub cancellations_total: AtomicU64,
    /// Cancellations committed.
    pub cancellations_confirmed: AtomicU64,
    /// Cancellations of already-cancelled bookings.
    pub cancellations_repeated: AtomicU64,
    /// Other business rejections (unknown room or booking, invalid input).
    pub rejections: AtomicU64,
    /// Row lock waits that timed out.
    pub lock_timeouts: AtomicU64,
    /// Connection acquisitions that timed out.
    pub pool_timeouts: AtomicU64,
    /// Unexpected store faults, each followed by a rollback.
    pub store_faults: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            reservations_total: AtomicU64::new(0),
            reservations_confirmed: AtomicU64::new(0),
            reservations_conflicted: AtomicU64::new(0),
            cancellations_total: AtomicU64::new(0),
            cancellations_confirmed: AtomicU64::new(0),
            cancellations_repeated: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
            pool_timeouts: AtomicU64::new(0),
            store_faults: AtomicU64::new(0),
        }
    }

    /// Increment reservation attempts.
    pub fn reservation_attempted(&self) {
        self.reservations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed reservation.
    pub fn reservation_confirmed(&self) {
        self.reservations_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cancellation attempts.
    pub fn cancellation_attempted(&self) {
        self.cancellations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed cancellation.
    pub fn cancellation_confirmed(&self) {
        self.cancellations_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed operation under the counter matching its error.
    pub fn record_error(&self, err: &ReservationError) {
        let counter = match err {
            ReservationError::RoomAlreadyBooked { .. } => &self.reservations_conflicted,
            ReservationError::AlreadyCancelled(_) => &self.cancellations_repeated,
            ReservationError::LockTimeout(_) => &self.lock_timeouts,
            ReservationError::PoolTimeout(_) => &self.pool_timeouts,
            ReservationError::StoreFault(_) | ReservationError::ConfigurationError(_) => {
                &self.store_faults
            }
            _ => &self.rejections,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reservations_total: self.reservations_total.load(Ordering::Relaxed),
            reservations_confirmed: self.reservations_confirmed.load(Ordering::Relaxed),
            reservations_conflicted: self.reservations_conflicted.load(Ordering::Relaxed),
            cancellations_total: self.cancellations_total.load(Ordering::Relaxed),
            cancellations_confirmed: self.cancellations_confirmed.load(Ordering::Relaxed),
            cancellations_repeated: self.cancellations_repeated.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            pool_timeouts: self.pool_timeouts.load(Ordering::Relaxed),
            store_faults: self.store_faults.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP innkeep_reservations_total Total reservation attempts
# TYPE innkeep_reservations_total counter
innkeep_reservations_total {}

# HELP innkeep_reservations_confirmed Total confirmed reservations
# TYPE innkeep_reservations_confirmed counter
innkeep_reservations_confirmed {}

# HELP innkeep_reservations_conflicted Reservations rejected for overlapping dates
# TYPE innkeep_reservations_conflicted counter
innkeep_reservations_conflicted {}

# HELP innkeep_cancellations_total Total cancellation attempts
# TYPE innkeep_cancellations_total counter
innkeep_cancellations_total {}

# HELP innkeep_cancellations_confirmed Total confirmed cancellations
# TYPE innkeep_cancellations_confirmed counter
innkeep_cancellations_confirmed {}

# HELP innkeep_cancellations_repeated Cancellations of already-cancelled bookings
# TYPE innkeep_cancellations_repeated counter
innkeep_cancellations_repeated {}

# HELP innkeep_rejections Other business rejections
# TYPE innkeep_rejections counter
innkeep_rejections {}

# HELP innkeep_lock_timeouts Row lock waits that timed out
# TYPE innkeep_lock_timeouts counter
innkeep_lock_timeouts {}

# HELP innkeep_pool_timeouts Connection acquisitions that timed out
# TYPE innkeep_pool_timeouts counter
innkeep_pool_timeouts {}

# HELP innkeep_store_faults Unexpected store faults
# TYPE innkeep_store_faults counter
innkeep_store_faults {}
"#,
            snapshot.reservations_total,
            snapshot.reservations_confirmed,
            snapshot.reservations_conflicted,
            snapshot.cancellations_total,
            snapshot.cancellations_confirmed,
            snapshot.cancellations_repeated,
            snapshot.rejections,
            snapshot.lock_timeouts,
            snapshot.pool_timeouts,
            snapshot.store_faults,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub reservations_total: u64,
    pub reservations_confirmed: u64,
    pub reservations_conflicted: u64,
    pub cancellations_total: u64,
    pub cancellations_confirmed: u64,
    pub cancellations_repeated: u64,
    pub rejections: u64,
    pub lock_timeouts: u64,
    pub pool_timeouts: u64,
    pub store_faults: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
