//! Simulation controller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::{Barrier, RwLock};
use tracing::{info, warn};

use innkeep_common::{
    Money, PaymentMethod, ReservationError, RoomId, RoomStatus, StayRange, UserId,
};
use innkeep_coordinator::{Reservation, ReservationCoordinator, ReserveRequest, RetryPolicy};
use innkeep_store::{MemoryStore, ReservationStore};

use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, Scenario, ScenarioStep};

const PAYMENT_METHODS: [PaymentMethod; 4] = [
    PaymentMethod::CreditCard,
    PaymentMethod::DebitCard,
    PaymentMethod::Paypal,
    PaymentMethod::BankTransfer,
];

/// Controls the simulation.
pub struct SimulationController<S> {
    /// Coordinator under test.
    coordinator: Arc<ReservationCoordinator<S>>,
    /// In-memory store handle for fault injection and pool checks, if the
    /// coordinator runs on one.
    probe: Option<MemoryStore>,
    /// Retry policy applied to every attempt.
    retry: RetryPolicy,
    /// Rooms by number.
    rooms: RwLock<HashMap<String, RoomId>>,
    /// Random number generator.
    rng: Arc<RwLock<StdRng>>,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
}

impl<S: ReservationStore + 'static> SimulationController<S> {
    /// Create a new simulation controller.
    pub fn new(
        coordinator: ReservationCoordinator<S>,
        probe: Option<MemoryStore>,
        retry: RetryPolicy,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            coordinator: Arc::new(coordinator),
            probe,
            retry,
            rooms: RwLock::new(HashMap::new()),
            rng: Arc::new(RwLock::new(rng)),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
        }
    }

    /// Get the coordinator under test.
    pub fn coordinator(&self) -> &ReservationCoordinator<S> {
        &self.coordinator
    }

    /// Add `count` rooms numbered from 1.
    pub async fn initialize(&self, count: usize) -> anyhow::Result<()> {
        info!("Initializing simulation with {} rooms", count);

        for n in 1..=count {
            self.add_room(&format!("{n}")).await?;
        }
        Ok(())
    }

    /// Run a scenario.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for step in &scenario.steps {
            self.execute_step(step).await?;
        }

        Ok(())
    }

    /// Run random reservations and cancellations from concurrent workers
    /// until the duration elapses.
    pub async fn run(&self, workers: usize, duration: Duration) -> anyhow::Result<()> {
        info!(workers, ?duration, "Running simulation in continuous mode");

        let rooms: Vec<RoomId> = self.rooms.read().await.values().copied().collect();
        if rooms.is_empty() {
            return Err(anyhow::anyhow!("No rooms to book"));
        }

        let deadline = Instant::now() + duration;
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let coordinator = self.coordinator.clone();
                let metrics = self.metrics.clone();
                let rng = self.rng.clone();
                let retry = self.retry.clone();
                let rooms = rooms.clone();

                tokio::spawn(async move {
                    while Instant::now() < deadline {
                        let (room_id, start, nights, cancel) = {
                            let mut rng = rng.write().await;
                            let room_id = rooms[rng.gen_range(0..rooms.len())];
                            let start = base_date() + Days::new(rng.gen_range(0..60));
                            (room_id, start, rng.gen_range(1..8), rng.gen_bool(0.2))
                        };

                        if cancel {
                            cancel_one(&coordinator, &metrics, room_id).await;
                            continue;
                        }

                        let Ok(stay) = stay_of(start, nights) else {
                            continue;
                        };
                        let request = ReserveRequest {
                            room_id,
                            user_id: UserId::new(worker as i64),
                            stay,
                            amount: price_for(&stay),
                            payment_method: PAYMENT_METHODS[worker % PAYMENT_METHODS.len()],
                        };

                        let started = Instant::now();
                        let outcome = retry.run(|| coordinator.reserve(request.clone())).await;
                        metrics
                            .write()
                            .await
                            .record_reservation(&outcome, started.elapsed().as_millis() as u64);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await?;
        }

        self.verify_no_overlaps().await
    }

    /// Get a snapshot of the metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Check that no room holds two active bookings with overlapping stays.
    pub async fn verify_no_overlaps(&self) -> anyhow::Result<()> {
        for (number, room_id) in self.rooms.read().await.iter() {
            let active: Vec<_> = self
                .coordinator
                .bookings_for_room(*room_id)
                .await?
                .into_iter()
                .filter(|b| b.status.holds_room())
                .collect();

            for (i, a) in active.iter().enumerate() {
                if let Some(b) = active[i + 1..].iter().find(|b| b.stay.overlaps(&a.stay)) {
                    return Err(anyhow::anyhow!(
                        "Room {} double-booked: booking {} {} overlaps booking {} {}",
                        number,
                        a.id,
                        a.stay,
                        b.id,
                        b.stay
                    ));
                }
            }
        }

        info!("No overlapping bookings found");
        Ok(())
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::AddRoom { number } => {
                self.add_room(number).await?;
            }
            ScenarioStep::Contend {
                room,
                attempts,
                check_in,
                check_out,
            } => {
                let room_id = self.room_id(room).await?;
                let stay = StayRange::new(*check_in, *check_out)?;
                let stays = vec![stay; *attempts];
                self.race(room_id, stays).await;
            }
            ScenarioStep::Stagger {
                room,
                attempts,
                check_in,
                nights,
            } => {
                let room_id = self.room_id(room).await?;
                let stays = (0..*attempts as u64)
                    .map(|i| stay_of(*check_in + Days::new(i), *nights))
                    .collect::<Result<_, _>>()?;
                self.race(room_id, stays).await;
            }
            ScenarioStep::AdjacentWeeks { room, weeks, start } => {
                let room_id = self.room_id(room).await?;
                let stays = (0..*weeks)
                    .map(|week| stay_of(*start + Days::new(week * 7), 7))
                    .collect::<Result<_, _>>()?;
                self.race(room_id, stays).await;
            }
            ScenarioStep::CancelAll { room } => {
                let room_id = self.room_id(room).await?;
                let active = self
                    .coordinator
                    .bookings_for_room(room_id)
                    .await?
                    .into_iter()
                    .filter(|b| b.status.holds_room());
                for booking in active {
                    let cancellation = self.coordinator.cancel(booking.id).await?;
                    self.metrics.write().await.record_cancellation();
                    info!(
                        booking_id = %cancellation.booking_id,
                        refunded = %cancellation.refunded,
                        "Cancelled"
                    );
                }
            }
            ScenarioStep::InjectFault { fault } => match &self.probe {
                Some(store) => {
                    info!(?fault, "Injecting store fault");
                    store.inject_fault(fault.point());
                }
                None => warn!(?fault, "Fault injection needs the in-memory store, skipping"),
            },
            ScenarioStep::Assert { condition } => self.check(condition).await?,
        }
        Ok(())
    }

    /// Fire one reservation per stay at once.
    async fn race(&self, room_id: RoomId, stays: Vec<StayRange>) {
        let barrier = Arc::new(Barrier::new(stays.len()));
        let handles: Vec<_> = stays
            .into_iter()
            .enumerate()
            .map(|(guest, stay)| {
                let coordinator = self.coordinator.clone();
                let barrier = barrier.clone();
                let retry = self.retry.clone();
                let request = ReserveRequest {
                    room_id,
                    user_id: UserId::new(guest as i64 + 1),
                    stay,
                    amount: price_for(&stay),
                    payment_method: PAYMENT_METHODS[guest % PAYMENT_METHODS.len()],
                };

                tokio::spawn(async move {
                    barrier.wait().await;
                    let started = Instant::now();
                    let outcome = retry.run(|| coordinator.reserve(request.clone())).await;
                    (outcome, started.elapsed())
                })
            })
            .collect();

        let mut confirmed: Vec<Reservation> = Vec::new();
        let mut rejected = 0usize;
        for handle in futures::future::join_all(handles).await {
            let (outcome, elapsed) = match handle {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Reservation task panicked");
                    continue;
                }
            };
            self.metrics
                .write()
                .await
                .record_reservation(&outcome, elapsed.as_millis() as u64);
            match outcome {
                Ok(reservation) => confirmed.push(reservation),
                Err(_) => rejected += 1,
            }
        }

        info!(
            room_id = %room_id,
            confirmed = confirmed.len(),
            rejected,
            "Race finished"
        );
    }

    async fn check(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::ActiveBookings { room, count } => {
                let room_id = self.room_id(room).await?;
                let active = self
                    .coordinator
                    .bookings_for_room(room_id)
                    .await?
                    .iter()
                    .filter(|b| b.status.holds_room())
                    .count();
                if active != *count {
                    return Err(anyhow::anyhow!(
                        "Room {}: expected {} active bookings, found {}",
                        room,
                        count,
                        active
                    ));
                }
            }
            AssertCondition::RoomStatusIs { room, status } => {
                let room_id = self.room_id(room).await?;
                let actual = self.coordinator.room(room_id).await?.status;
                if actual != *status {
                    return Err(anyhow::anyhow!(
                        "Room {}: expected status {}, found {}",
                        room,
                        status.as_str(),
                        actual.as_str()
                    ));
                }
            }
            AssertCondition::PoolBalanced => match &self.probe {
                Some(store) => {
                    let (acquired, released) =
                        (store.connections_acquired(), store.connections_released());
                    if acquired != released {
                        return Err(anyhow::anyhow!(
                            "Connection leak: {} acquired, {} released",
                            acquired,
                            released
                        ));
                    }
                }
                None => warn!("Pool accounting needs the in-memory store, skipping"),
            },
        }

        info!(?condition, "Assertion passed");
        Ok(())
    }

    async fn add_room(&self, number: &str) -> anyhow::Result<RoomId> {
        let room = self.coordinator.add_room(number, RoomStatus::Available).await?;
        self.rooms.write().await.insert(number.to_string(), room.id);
        Ok(room.id)
    }

    async fn room_id(&self, number: &str) -> anyhow::Result<RoomId> {
        self.rooms
            .read()
            .await
            .get(number)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Unknown room: {}", number))
    }
}

/// Cancel one random active booking of a room, if it has any.
async fn cancel_one<S: ReservationStore>(
    coordinator: &ReservationCoordinator<S>,
    metrics: &RwLock<SimulationMetrics>,
    room_id: RoomId,
) {
    let bookings = match coordinator.bookings_for_room(room_id).await {
        Ok(bookings) => bookings,
        Err(e) => {
            warn!(error = %e, "Could not list bookings");
            return;
        }
    };

    let Some(booking) = bookings.into_iter().find(|b| b.status.is_cancellable()) else {
        return;
    };

    match coordinator.cancel(booking.id).await {
        Ok(_) => metrics.write().await.record_cancellation(),
        // Another worker got there first.
        Err(ReservationError::AlreadyCancelled(_)) => {}
        Err(e) => warn!(booking_id = %booking.id, error = %e, "Cancellation failed"),
    }
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

fn stay_of(start: NaiveDate, nights: u64) -> innkeep_common::Result<StayRange> {
    StayRange::new(start, start + Days::new(nights))
}

/// 120.00 per night.
fn price_for(stay: &StayRange) -> Money {
    Money::new(Decimal::new(12000, 2) * Decimal::from(stay.nights()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_store::StoreConfig;

    fn create_test_controller() -> SimulationController<MemoryStore> {
        let store = MemoryStore::new(&StoreConfig::default());
        SimulationController::new(
            ReservationCoordinator::new(store.clone()),
            Some(store),
            RetryPolicy::default(),
            Some(42),
        )
    }

    #[tokio::test]
    async fn test_every_builtin_scenario_passes() {
        for name in Scenario::names() {
            let controller = create_test_controller();
            controller
                .run_scenario(Scenario::load(name).unwrap())
                .await
                .unwrap_or_else(|e| panic!("scenario {name} failed: {e}"));
        }
    }

    #[tokio::test]
    async fn test_contention_confirms_one() {
        let controller = create_test_controller();
        controller
            .run_scenario(Scenario::load("contention").unwrap())
            .await
            .unwrap();

        let metrics = controller.get_metrics().await;
        assert_eq!(metrics.total_reservations, 50);
        assert_eq!(metrics.confirmed, 1);
        assert_eq!(metrics.conflicted, 49);
    }

    #[tokio::test]
    async fn test_random_run_never_double_books() {
        let controller = create_test_controller();
        controller.initialize(3).await.unwrap();
        controller
            .run(4, Duration::from_millis(200))
            .await
            .unwrap();

        let metrics = controller.get_metrics().await;
        assert!(metrics.total_reservations > 0);
        assert_eq!(metrics.failed, 0);
    }

    #[test]
    fn test_price_scales_with_nights() {
        let stay = stay_of(base_date(), 3).unwrap();
        assert_eq!(price_for(&stay), Money::from_str("360.00").unwrap());
    }
}
