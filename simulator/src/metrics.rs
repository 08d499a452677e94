//! Simulation metrics.

use std::collections::VecDeque;

use innkeep_common::ReservationError;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Total reservation attempts.
    pub total_reservations: u64,
    /// Confirmed reservations.
    pub confirmed: u64,
    /// Reservations rejected for overlapping dates.
    pub conflicted: u64,
    /// Attempts that hit a lock or pool timeout.
    pub timed_out: u64,
    /// Attempts that failed for any other reason.
    pub failed: u64,
    /// Confirmed cancellations.
    pub cancellations: u64,
    /// Latency samples (ms).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_reservations: 0,
            confirmed: 0,
            conflicted: 0,
            timed_out: 0,
            failed: 0,
            cancellations: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record the outcome of a reservation attempt.
    pub fn record_reservation<T>(&mut self, outcome: &Result<T, ReservationError>, latency_ms: u64) {
        self.total_reservations += 1;
        match outcome {
            Ok(_) => self.confirmed += 1,
            Err(ReservationError::RoomAlreadyBooked { .. }) => self.conflicted += 1,
            Err(e) if e.is_retryable() => self.timed_out += 1,
            Err(_) => self.failed += 1,
        }

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
    }

    /// Record a confirmed cancellation.
    pub fn record_cancellation(&mut self) {
        self.cancellations += 1;
    }

    /// Get average latency in ms.
    pub fn average_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p99 latency.
    pub fn p99_latency_ms(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of attempts that were confirmed.
    pub fn confirmation_rate(&self) -> f64 {
        if self.total_reservations == 0 {
            return 0.0;
        }

        self.confirmed as f64 / self.total_reservations as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
