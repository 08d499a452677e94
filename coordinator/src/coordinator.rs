//! Core coordinator implementation.
//!
//! Every operation runs inside exactly one unit of work. The target row is
//! locked before anything is read, so concurrent attempts on the same room
//! are serialized by the store and the loser observes the winner's committed
//! booking. Any error rolls the unit of work back; dropping it releases the
//! connection on every path.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use innkeep_common::{
    Booking, BookingId, BookingStatus, Money, NewBooking, NewPayment, Payment, PaymentId,
    PaymentMethod, PaymentStatus, ReservationError, Result, Room, RoomId, RoomStatus, StayRange,
    TransactionLog, TransactionRef, UserId,
};
use innkeep_store::{ReservationStore, UnitOfWork};

use crate::metrics::{Metrics, SharedMetrics};

/// Reservation request.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    /// Room to book.
    pub room_id: RoomId,
    /// Guest making the booking.
    pub user_id: UserId,
    /// Requested nights.
    pub stay: StayRange,
    /// Amount charged for the stay.
    pub amount: Money,
    /// How the guest pays.
    pub payment_method: PaymentMethod,
}

/// A committed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub booking_id: BookingId,
    pub payment_id: PaymentId,
    pub transaction_ref: TransactionRef,
    pub room_id: RoomId,
    pub stay: StayRange,
    pub amount: Money,
}

/// A committed cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    pub booking_id: BookingId,
    pub room_id: RoomId,
    /// Sum of the payments moved from SUCCESS to REFUNDED.
    pub refunded: Money,
}

/// Orchestrates reservations and cancellations against a store.
///
/// Holds no per-room state of its own; it can be shared freely across tasks.
pub struct ReservationCoordinator<S> {
    /// Durable store.
    store: S,
    /// Operation counters.
    metrics: SharedMetrics,
}

impl<S: ReservationStore> ReservationCoordinator<S> {
    /// Create a coordinator with fresh metrics.
    pub fn new(store: S) -> Self {
        Self::with_metrics(store, Arc::new(Metrics::new()))
    }

    /// Create a coordinator reporting into existing metrics.
    pub fn with_metrics(store: S, metrics: SharedMetrics) -> Self {
        Self { store, metrics }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the coordinator metrics.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Book a room for a stay and record its payment, atomically.
    ///
    /// On success the booking is CONFIRMED, its payment is SUCCESS and the
    /// room is OCCUPIED. On any error nothing is written.
    #[instrument(skip(self, request), fields(room_id = %request.room_id, stay = %request.stay))]
    pub async fn reserve(&self, request: ReserveRequest) -> Result<Reservation> {
        self.metrics.reservation_attempted();

        let result = self.try_reserve(&request).await;
        match &result {
            Ok(reservation) => {
                self.metrics.reservation_confirmed();
                info!(
                    booking_id = %reservation.booking_id,
                    transaction_ref = %reservation.transaction_ref,
                    "Reservation confirmed"
                );
            }
            Err(e) => self.metrics.record_error(e),
        }
        result
    }

    /// Cancel a booking, refund its payments and free its room.
    ///
    /// The room goes back to AVAILABLE even if other bookings on it are
    /// still active; room status is a hint, bookings are the source of truth.
    ///
    /// Cancelling an already-cancelled booking fails with `AlreadyCancelled`
    /// and changes nothing.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn cancel(&self, booking_id: BookingId) -> Result<Cancellation> {
        self.metrics.cancellation_attempted();

        let result = self.try_cancel(booking_id).await;
        match &result {
            Ok(cancellation) => {
                self.metrics.cancellation_confirmed();
                info!(
                    room_id = %cancellation.room_id,
                    refunded = %cancellation.refunded,
                    "Booking cancelled"
                );
            }
            Err(e) => self.metrics.record_error(e),
        }
        result
    }

    /// Force a room into a status under its row lock.
    ///
    /// Administrative: active bookings are left untouched.
    #[instrument(skip(self), fields(room_id = %room_id, status = status.as_str()))]
    pub async fn override_room_status(&self, room_id: RoomId, status: RoomStatus) -> Result<Room> {
        let mut unit = self.store.begin().await?;
        let outcome: Result<Room> = async {
            let room = unit
                .lock_room(room_id)
                .await?
                .ok_or(ReservationError::RoomNotFound(room_id))?;
            unit.set_room_status(room_id, status).await?;
            Ok(Room { status, ..room })
        }
        .await;
        let room = Self::finish(unit, outcome).await?;

        info!("Room status overridden");
        Ok(room)
    }

    /// Add a room to the inventory.
    pub async fn add_room(&self, number: &str, status: RoomStatus) -> Result<Room> {
        let room = self.store.insert_room(number, status).await?;
        info!(room_id = %room.id, number, "Room added");
        Ok(room)
    }

    /// Get a room by ID.
    pub async fn room(&self, room_id: RoomId) -> Result<Room> {
        self.store
            .room(room_id)
            .await?
            .ok_or(ReservationError::RoomNotFound(room_id))
    }

    /// Get a booking by ID.
    pub async fn booking(&self, booking_id: BookingId) -> Result<Booking> {
        self.store
            .booking(booking_id)
            .await?
            .ok_or(ReservationError::BookingNotFound(booking_id))
    }

    /// All bookings of a room, in any status.
    pub async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>> {
        self.store.bookings_for_room(room_id).await
    }

    /// All payments of a booking.
    pub async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        self.store.payments_for_booking(booking_id).await
    }

    /// Audit trail of a booking.
    pub async fn logs_for_booking(&self, booking_id: BookingId) -> Result<Vec<TransactionLog>> {
        self.store.logs_for_booking(booking_id).await
    }

    // --- Private methods ---

    async fn try_reserve(&self, request: &ReserveRequest) -> Result<Reservation> {
        // Charge what the price column can hold.
        let amount = request.amount.round();
        if !amount.is_positive() {
            return Err(ReservationError::InvalidAmount(request.amount));
        }
        let request = ReserveRequest {
            amount,
            ..request.clone()
        };

        let mut unit = self.store.begin().await?;
        let outcome = Self::reserve_in(&mut unit, &request).await;
        Self::finish(unit, outcome).await
    }

    async fn try_cancel(&self, booking_id: BookingId) -> Result<Cancellation> {
        let mut unit = self.store.begin().await?;
        let outcome = Self::cancel_in(&mut unit, booking_id).await;
        Self::finish(unit, outcome).await
    }

    async fn reserve_in(unit: &mut S::Unit, request: &ReserveRequest) -> Result<Reservation> {
        // Lock first: every read below sees the last committed booking.
        let room = unit
            .lock_room(request.room_id)
            .await?
            .ok_or(ReservationError::RoomNotFound(request.room_id))?;

        let active = unit.active_bookings(room.id).await?;
        if let Some(conflict) = active.iter().find(|b| b.stay.overlaps(&request.stay)) {
            return Err(ReservationError::RoomAlreadyBooked {
                room_id: room.id,
                conflicting: conflict.id,
            });
        }

        let booking_id = unit
            .insert_booking(&NewBooking {
                user_id: request.user_id,
                room_id: room.id,
                stay: request.stay,
                total_price: request.amount,
                status: BookingStatus::Confirmed,
            })
            .await?;

        let transaction_ref = TransactionRef::generate();
        let payment_id = unit
            .insert_payment(&NewPayment {
                booking_id,
                amount: request.amount,
                method: request.payment_method,
                status: PaymentStatus::Success,
                transaction_ref: transaction_ref.clone(),
            })
            .await?;

        unit.set_room_status(room.id, RoomStatus::Occupied).await?;
        unit.append_log(
            booking_id,
            &format!(
                "booking confirmed: room={} stay={} txn={}",
                room.id, request.stay, transaction_ref
            ),
        )
        .await?;

        Ok(Reservation {
            booking_id,
            payment_id,
            transaction_ref,
            room_id: room.id,
            stay: request.stay,
            amount: request.amount,
        })
    }

    async fn cancel_in(unit: &mut S::Unit, booking_id: BookingId) -> Result<Cancellation> {
        // Booking before room. Reserve never waits on a booking lock, so the
        // two protocols cannot wait on each other in a cycle.
        let booking = unit
            .lock_booking(booking_id)
            .await?
            .ok_or(ReservationError::BookingNotFound(booking_id))?;

        match booking.status {
            BookingStatus::Cancelled => return Err(ReservationError::AlreadyCancelled(booking_id)),
            status if !status.is_cancellable() => {
                return Err(ReservationError::NotCancellable { booking_id, status })
            }
            _ => {}
        }

        unit.set_booking_status(booking_id, BookingStatus::Cancelled)
            .await?;
        let refunded = unit.refund_payments(booking_id).await?;
        unit.set_room_status(booking.room_id, RoomStatus::Available)
            .await?;
        unit.append_log(
            booking_id,
            &format!(
                "booking cancelled: room={} refunded={}",
                booking.room_id, refunded
            ),
        )
        .await?;

        Ok(Cancellation {
            booking_id,
            room_id: booking.room_id,
            refunded,
        })
    }

    /// Commit on success, roll back on error.
    async fn finish<T>(unit: S::Unit, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                unit.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if e.is_business_rejection() {
                    debug!(code = e.error_code(), error = %e, "Rejected, rolling back");
                } else {
                    warn!(code = e.error_code(), error = %e, "Failed, rolling back");
                }
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection discarded");
                }
                Err(e)
            }
        }
    }
}
