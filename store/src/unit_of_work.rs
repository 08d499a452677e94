//! Store and unit-of-work traits.

use async_trait::async_trait;

use innkeep_common::{
    Booking, BookingId, BookingStatus, LogId, Money, NewBooking, NewPayment, Payment, PaymentId,
    Result, Room, RoomId, RoomStatus, TransactionLog,
};

/// A durable store that hands out units of work over pooled connections.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Unit of work type produced by [`ReservationStore::begin`].
    type Unit: UnitOfWork;

    /// Acquire a pooled connection and open a transaction on it.
    ///
    /// May suspend until a connection frees up; fails with `PoolTimeout`
    /// once the configured acquire timeout elapses.
    async fn begin(&self) -> Result<Self::Unit>;

    /// Insert a room outside of any unit of work.
    async fn insert_room(&self, number: &str, status: RoomStatus) -> Result<Room>;

    /// Read a room's committed state.
    async fn room(&self, id: RoomId) -> Result<Option<Room>>;

    /// Read a booking's committed state.
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// All committed bookings of a room, oldest first.
    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>>;

    /// All committed payments of a booking, oldest first.
    async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>>;

    /// All committed audit entries of a booking, oldest first.
    async fn logs_for_booking(&self, booking_id: BookingId) -> Result<Vec<TransactionLog>>;
}

/// One transaction on one connection.
///
/// Dropping a unit of work without committing rolls it back and releases its
/// connection and row locks.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock a room row until the unit of work ends and return its current
    /// state, or `None` if the room does not exist.
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>>;

    /// Bookings of a room whose status holds the room (PENDING or CONFIRMED).
    async fn active_bookings(&mut self, room_id: RoomId) -> Result<Vec<Booking>>;

    /// Insert a booking row.
    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<BookingId>;

    /// Insert a payment row.
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<PaymentId>;

    /// Overwrite a room's status.
    async fn set_room_status(&mut self, id: RoomId, status: RoomStatus) -> Result<()>;

    /// Lock a booking row until the unit of work ends and return its current
    /// state, or `None` if the booking does not exist.
    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>>;

    /// Overwrite a booking's status.
    async fn set_booking_status(&mut self, id: BookingId, status: BookingStatus) -> Result<()>;

    /// Mark the booking's successful payments as refunded and return the
    /// refunded total.
    async fn refund_payments(&mut self, booking_id: BookingId) -> Result<Money>;

    /// Append an audit entry.
    async fn append_log(&mut self, booking_id: BookingId, details: &str) -> Result<LogId>;

    /// Make every write visible atomically and release the connection.
    async fn commit(self) -> Result<()>;

    /// Discard every write and release the connection.
    async fn rollback(self) -> Result<()>;
}
