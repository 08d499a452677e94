//! In-memory store with emulated row locks.
//!
//! Mirrors the behavior the coordinator relies on from PostgreSQL under
//! READ COMMITTED:
//!
//! - a bounded pool: each unit of work holds one connection lease, returned
//!   exactly once when the unit of work ends
//! - row locks held until commit or rollback, with waits bounded by the lock
//!   timeout; writing a row takes its lock first, like `UPDATE`
//! - writes are staged per unit of work and applied atomically on commit, so
//!   other units of work only ever see committed state
//! - sequence values are consumed even when the unit of work rolls back
//!
//! Faults can be injected at any step with [`MemoryStore::inject_fault`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use innkeep_common::{
    Booking, BookingId, BookingStatus, LogId, Money, NewBooking, NewPayment, Payment, PaymentId,
    PaymentStatus, ReservationError, Result, Room, RoomId, RoomStatus, TransactionLog,
};

use crate::config::StoreConfig;
use crate::unit_of_work::{ReservationStore, UnitOfWork};

/// A step at which an injected fault can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    LockRoom,
    ActiveBookings,
    InsertBooking,
    InsertPayment,
    SetRoomStatus,
    LockBooking,
    SetBookingStatus,
    RefundPayments,
    AppendLog,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Room(RoomId),
    Booking(BookingId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Room(id) => write!(f, "room {id}"),
            RowKey::Booking(id) => write!(f, "booking {id}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Write {
    PutBooking(Booking),
    PutPayment(Payment),
    RoomStatus(RoomId, RoomStatus),
    PutLog(TransactionLog),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rooms: BTreeMap<RoomId, Room>,
    bookings: BTreeMap<BookingId, Booking>,
    payments: BTreeMap<PaymentId, Payment>,
    logs: BTreeMap<LogId, TransactionLog>,
    room_seq: i64,
    booking_seq: i64,
    payment_seq: i64,
    log_seq: i64,
}

impl Tables {
    fn apply(&mut self, write: Write) {
        match write {
            Write::PutBooking(booking) => {
                self.bookings.insert(booking.id, booking);
            }
            Write::PutPayment(payment) => {
                self.payments.insert(payment.id, payment);
            }
            Write::RoomStatus(id, status) => {
                if let Some(room) = self.rooms.get_mut(&id) {
                    room.status = status;
                }
            }
            Write::PutLog(log) => {
                self.logs.insert(log.id, log);
            }
        }
    }

    fn next(seq: &mut i64) -> i64 {
        *seq += 1;
        *seq
    }
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: DashMap<RowKey, Arc<RowMutex<()>>>,
    connections: Arc<Semaphore>,
    max_connections: u32,
    acquire_timeout: Duration,
    lock_timeout: Duration,
    acquired: AtomicU64,
    released: AtomicU64,
    faults: Mutex<Vec<FaultPoint>>,
}

impl Shared {
    fn take_fault(&self, point: FaultPoint) -> Result<()> {
        let mut faults = self.faults.lock();
        if let Some(pos) = faults.iter().position(|f| *f == point) {
            faults.remove(pos);
            warn!(?point, "Injected store fault");
            return Err(ReservationError::StoreFault(format!(
                "injected fault at {point:?}"
            )));
        }
        Ok(())
    }
}

/// In-memory reservation store.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store. Only the pool size and timeouts of `config` are
    /// used.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: DashMap::new(),
                connections: Arc::new(Semaphore::new(config.max_connections as usize)),
                max_connections: config.max_connections,
                acquire_timeout: config.acquire_timeout,
                lock_timeout: config.lock_timeout,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                faults: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make the next call reaching `point` fail with a `StoreFault`.
    /// Faults queue up and each fires once.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.shared.faults.lock().push(point);
    }

    /// Number of injected faults that have not fired yet.
    pub fn pending_faults(&self) -> usize {
        self.shared.faults.lock().len()
    }

    /// Connections handed out by `begin` so far.
    pub fn connections_acquired(&self) -> u64 {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    /// Connections returned to the pool so far.
    pub fn connections_released(&self) -> u64 {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Rows with a lock entry, held or awaited.
    pub fn tracked_row_locks(&self) -> usize {
        self.shared.row_locks.len()
    }

    /// Connections currently free.
    pub fn idle_connections(&self) -> usize {
        self.shared.connections.available_permits()
    }

    /// Pool size.
    pub fn max_connections(&self) -> u32 {
        self.shared.max_connections
    }

    /// Every committed booking.
    pub fn all_bookings(&self) -> Vec<Booking> {
        self.shared.tables.lock().bookings.values().cloned().collect()
    }

    /// Every committed payment.
    pub fn all_payments(&self) -> Vec<Payment> {
        self.shared.tables.lock().payments.values().cloned().collect()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    type Unit = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork> {
        let permit = tokio::time::timeout(
            self.shared.acquire_timeout,
            self.shared.connections.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            ReservationError::PoolTimeout(format!(
                "no connection free after {:?}",
                self.shared.acquire_timeout
            ))
        })?
        .map_err(|_| ReservationError::StoreFault("connection pool closed".to_string()))?;

        self.shared.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(MemoryUnitOfWork {
            shared: self.shared.clone(),
            held: HashMap::new(),
            staged: Vec::new(),
            finished: false,
            _lease: ConnectionLease {
                _permit: permit,
                shared: self.shared.clone(),
            },
        })
    }

    async fn insert_room(&self, number: &str, status: RoomStatus) -> Result<Room> {
        let mut tables = self.shared.tables.lock();
        if tables.rooms.values().any(|r| r.number == number) {
            return Err(ReservationError::StoreFault(format!(
                "insert room: duplicate room number {number}"
            )));
        }

        let id = RoomId::new(Tables::next(&mut tables.room_seq));
        let room = Room {
            id,
            number: number.to_string(),
            status,
        };
        tables.rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        Ok(self.shared.tables.lock().rooms.get(&id).cloned())
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.shared.tables.lock().bookings.get(&id).cloned())
    }

    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>> {
        Ok(self
            .shared
            .tables
            .lock()
            .bookings
            .values()
            .filter(|b| b.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        Ok(self
            .shared
            .tables
            .lock()
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn logs_for_booking(&self, booking_id: BookingId) -> Result<Vec<TransactionLog>> {
        Ok(self
            .shared
            .tables
            .lock()
            .logs
            .values()
            .filter(|l| l.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

/// A pooled connection; counts its own release.
struct ConnectionLease {
    _permit: OwnedSemaphorePermit,
    shared: Arc<Shared>,
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A unit of work on the in-memory store.
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    // Field order is drop order: row locks go before the connection.
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    staged: Vec<Write>,
    finished: bool,
    _lease: ConnectionLease,
}

impl MemoryUnitOfWork {
    async fn lock_row(&mut self, key: RowKey) -> Result<()> {
        if self.held.contains_key(&key) {
            return Ok(());
        }

        let row = self.shared.row_locks.entry(key).or_default().value().clone();
        let guard = match tokio::time::timeout(self.shared.lock_timeout, row.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                self.shared
                    .row_locks
                    .remove_if(&key, |_, row| Arc::strong_count(row) == 1);
                return Err(ReservationError::LockTimeout(key.to_string()));
            }
        };

        debug!(row = %key, "Row locked");
        self.held.insert(key, guard);
        Ok(())
    }

    /// Committed state with this unit of work's own writes applied.
    fn snapshot(&self) -> Tables {
        let mut tables = self.shared.tables.lock().clone();
        for write in &self.staged {
            tables.apply(write.clone());
        }
        tables
    }

    fn next_id(&self, seq: fn(&mut Tables) -> &mut i64) -> i64 {
        let mut tables = self.shared.tables.lock();
        Tables::next(seq(&mut tables))
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished && !self.staged.is_empty() {
            debug!(
                writes = self.staged.len(),
                "Unit of work dropped without commit, writes discarded"
            );
        }

        // Release our guards, then forget rows nobody else is waiting on.
        let keys: Vec<RowKey> = self.held.drain().map(|(key, _guard)| key).collect();
        for key in keys {
            self.shared
                .row_locks
                .remove_if(&key, |_, row| Arc::strong_count(row) == 1);
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>> {
        self.shared.take_fault(FaultPoint::LockRoom)?;

        if !self.shared.tables.lock().rooms.contains_key(&id) {
            return Ok(None);
        }
        self.lock_row(RowKey::Room(id)).await?;

        Ok(self.snapshot().rooms.get(&id).cloned())
    }

    async fn active_bookings(&mut self, room_id: RoomId) -> Result<Vec<Booking>> {
        self.shared.take_fault(FaultPoint::ActiveBookings)?;

        let mut active: Vec<Booking> = self
            .snapshot()
            .bookings
            .into_values()
            .filter(|b| b.room_id == room_id && b.status.holds_room())
            .collect();
        active.sort_by_key(|b| b.stay.check_in());
        Ok(active)
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<BookingId> {
        self.shared.take_fault(FaultPoint::InsertBooking)?;

        if !self.snapshot().rooms.contains_key(&booking.room_id) {
            return Err(ReservationError::StoreFault(format!(
                "insert booking: room {} does not exist",
                booking.room_id
            )));
        }

        let id = BookingId::new(self.next_id(|t| &mut t.booking_seq));
        self.staged.push(Write::PutBooking(Booking {
            id,
            user_id: booking.user_id,
            room_id: booking.room_id,
            stay: booking.stay,
            total_price: booking.total_price,
            status: booking.status,
            created_at: Utc::now(),
        }));
        Ok(id)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<PaymentId> {
        self.shared.take_fault(FaultPoint::InsertPayment)?;

        let snapshot = self.snapshot();
        if !snapshot.bookings.contains_key(&payment.booking_id) {
            return Err(ReservationError::StoreFault(format!(
                "insert payment: booking {} does not exist",
                payment.booking_id
            )));
        }
        if snapshot
            .payments
            .values()
            .any(|p| p.transaction_ref == payment.transaction_ref)
        {
            return Err(ReservationError::StoreFault(format!(
                "insert payment: duplicate transaction reference {}",
                payment.transaction_ref
            )));
        }

        let id = PaymentId::new(self.next_id(|t| &mut t.payment_seq));
        self.staged.push(Write::PutPayment(Payment {
            id,
            booking_id: payment.booking_id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            transaction_ref: payment.transaction_ref.clone(),
            created_at: Utc::now(),
        }));
        Ok(id)
    }

    async fn set_room_status(&mut self, id: RoomId, status: RoomStatus) -> Result<()> {
        self.shared.take_fault(FaultPoint::SetRoomStatus)?;

        if !self.shared.tables.lock().rooms.contains_key(&id) {
            return Err(ReservationError::StoreFault(format!(
                "update room {id}: 0 rows affected"
            )));
        }
        self.lock_row(RowKey::Room(id)).await?;

        self.staged.push(Write::RoomStatus(id, status));
        Ok(())
    }

    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>> {
        self.shared.take_fault(FaultPoint::LockBooking)?;

        if !self.snapshot().bookings.contains_key(&id) {
            return Ok(None);
        }
        self.lock_row(RowKey::Booking(id)).await?;

        Ok(self.snapshot().bookings.get(&id).cloned())
    }

    async fn set_booking_status(&mut self, id: BookingId, status: BookingStatus) -> Result<()> {
        self.shared.take_fault(FaultPoint::SetBookingStatus)?;

        if !self.snapshot().bookings.contains_key(&id) {
            return Err(ReservationError::StoreFault(format!(
                "update booking {id}: 0 rows affected"
            )));
        }
        self.lock_row(RowKey::Booking(id)).await?;

        let mut booking = self.snapshot().bookings.remove(&id).ok_or_else(|| {
            ReservationError::StoreFault(format!("update booking {id}: 0 rows affected"))
        })?;
        booking.status = status;
        self.staged.push(Write::PutBooking(booking));
        Ok(())
    }

    async fn refund_payments(&mut self, booking_id: BookingId) -> Result<Money> {
        self.shared.take_fault(FaultPoint::RefundPayments)?;

        let refunds: Vec<Payment> = self
            .snapshot()
            .payments
            .into_values()
            .filter(|p| p.booking_id == booking_id && p.status == PaymentStatus::Success)
            .collect();

        let mut total = Money::zero();
        for mut payment in refunds {
            total = total + payment.amount;
            payment.status = PaymentStatus::Refunded;
            self.staged.push(Write::PutPayment(payment));
        }
        Ok(total)
    }

    async fn append_log(&mut self, booking_id: BookingId, details: &str) -> Result<LogId> {
        self.shared.take_fault(FaultPoint::AppendLog)?;

        if !self.snapshot().bookings.contains_key(&booking_id) {
            return Err(ReservationError::StoreFault(format!(
                "append transaction log: booking {booking_id} does not exist"
            )));
        }

        let id = LogId::new(self.next_id(|t| &mut t.log_seq));
        self.staged.push(Write::PutLog(TransactionLog {
            id,
            booking_id,
            details: details.to_string(),
            created_at: Utc::now(),
        }));
        Ok(id)
    }

    async fn commit(mut self) -> Result<()> {
        self.shared.take_fault(FaultPoint::Commit)?;

        let mut tables = self.shared.tables.lock();

        // Unique index on payments.transaction_ref.
        for write in &self.staged {
            if let Write::PutPayment(payment) = write {
                let clash = tables.payments.values().any(|p| {
                    p.id != payment.id && p.transaction_ref == payment.transaction_ref
                });
                if clash {
                    return Err(ReservationError::StoreFault(format!(
                        "commit: duplicate transaction reference {}",
                        payment.transaction_ref
                    )));
                }
            }
        }

        let writes = self.staged.len();
        for write in self.staged.drain(..) {
            tables.apply(write);
        }
        drop(tables);

        self.finished = true;
        debug!(writes, "Unit of work committed");
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.staged.clear();
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use innkeep_common::{PaymentMethod, StayRange, TransactionRef, UserId};
    use tokio_test::{assert_err, assert_ok};

    fn config(max_connections: u32, lock_timeout_ms: u64) -> StoreConfig {
        StoreConfig {
            max_connections,
            acquire_timeout: Duration::from_millis(50),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            ..StoreConfig::default()
        }
    }

    fn new_booking(room_id: RoomId) -> NewBooking {
        let check_in = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        NewBooking {
            user_id: UserId::new(1),
            room_id,
            stay: StayRange::new(check_in, check_out).unwrap(),
            total_price: Money::from_str("400.00").unwrap(),
            status: BookingStatus::Confirmed,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = MemoryStore::new(&config(4, 100));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.lock_room(room.id).await.unwrap();
        let booking_id = uow.insert_booking(&new_booking(room.id)).await.unwrap();
        uow.set_room_status(room.id, RoomStatus::Occupied).await.unwrap();

        assert!(store.booking(booking_id).await.unwrap().is_none());
        assert_eq!(
            store.room(room.id).await.unwrap().unwrap().status,
            RoomStatus::Available
        );

        uow.commit().await.unwrap();

        assert!(store.booking(booking_id).await.unwrap().is_some());
        assert_eq!(
            store.room(room.id).await.unwrap().unwrap().status,
            RoomStatus::Occupied
        );
    }

    #[tokio::test]
    async fn test_drop_rolls_back_and_releases_connection() {
        let store = MemoryStore::new(&config(1, 100));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            uow.lock_room(room.id).await.unwrap();
            uow.insert_booking(&new_booking(room.id)).await.unwrap();
            assert_eq!(store.idle_connections(), 0);
        }

        assert_eq!(store.connections_acquired(), 1);
        assert_eq!(store.connections_released(), 1);
        assert_eq!(store.idle_connections(), 1);
        assert!(store.all_bookings().is_empty());

        // Room lock was released with the connection.
        let mut uow = store.begin().await.unwrap();
        assert_ok!(uow.lock_room(room.id).await);
    }

    #[tokio::test]
    async fn test_row_lock_entries_are_pruned_when_units_end() {
        let store = MemoryStore::new(&config(2, 100));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.lock_room(room.id).await.unwrap();
        let booking_id = uow.insert_booking(&new_booking(room.id)).await.unwrap();
        assert_eq!(store.tracked_row_locks(), 1);
        uow.commit().await.unwrap();
        assert_eq!(store.tracked_row_locks(), 0);

        let mut uow = store.begin().await.unwrap();
        uow.lock_booking(booking_id).await.unwrap();
        uow.lock_room(room.id).await.unwrap();
        assert_eq!(store.tracked_row_locks(), 2);
        uow.rollback().await.unwrap();
        assert_eq!(store.tracked_row_locks(), 0);
    }

    #[tokio::test]
    async fn test_row_lock_entry_survives_while_awaited() {
        let store = MemoryStore::new(&config(2, 1_000));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.lock_room(room.id).await.unwrap();

        let waiter_store = store.clone();
        let waiter = tokio::spawn(async move {
            let mut uow = waiter_store.begin().await.unwrap();
            uow.lock_room(room.id).await.unwrap();
            uow.commit().await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(holder);
        assert_ok!(waiter.await);
        assert_eq!(store.tracked_row_locks(), 0);
    }

    #[tokio::test]
    async fn test_row_lock_wait_times_out() {
        let store = MemoryStore::new(&config(2, 50));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        let mut holder = store.begin().await.unwrap();
        holder.lock_room(room.id).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = assert_err!(waiter.lock_room(room.id).await);
        assert!(matches!(err, ReservationError::LockTimeout(ref what) if what == "room 1"));

        holder.rollback().await.unwrap();
        assert_ok!(waiter.lock_room(room.id).await);
    }

    #[tokio::test]
    async fn test_lock_is_reentrant_within_unit_of_work() {
        let store = MemoryStore::new(&config(1, 50));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.lock_room(room.id).await.unwrap();
        assert_ok!(uow.set_room_status(room.id, RoomStatus::Cleaning).await);
        assert_ok!(uow.lock_room(room.id).await);
    }

    #[tokio::test]
    async fn test_pool_exhaustion_times_out() {
        let store = MemoryStore::new(&config(1, 50));
        let _held = store.begin().await.unwrap();

        let err = store.begin().await.err().expect("pool should be exhausted");
        assert!(matches!(err, ReservationError::PoolTimeout(_)));
        assert_eq!(store.connections_acquired(), 1);
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let store = MemoryStore::new(&config(2, 50));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();
        store.inject_fault(FaultPoint::InsertBooking);

        let mut uow = store.begin().await.unwrap();
        let err = assert_err!(uow.insert_booking(&new_booking(room.id)).await);
        assert!(matches!(err, ReservationError::StoreFault(_)));
        assert_eq!(store.pending_faults(), 0);
        assert_ok!(uow.insert_booking(&new_booking(room.id)).await);
    }

    #[tokio::test]
    async fn test_payment_requires_booking_and_unique_reference() {
        let store = MemoryStore::new(&config(2, 50));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();
        let mut uow = store.begin().await.unwrap();

        let payment = |booking_id, transaction_ref: &TransactionRef| NewPayment {
            booking_id,
            amount: Money::from_str("400.00").unwrap(),
            method: PaymentMethod::CreditCard,
            status: PaymentStatus::Success,
            transaction_ref: transaction_ref.clone(),
        };
        let reference = TransactionRef::generate();

        assert_err!(uow.insert_payment(&payment(BookingId::new(99), &reference)).await);

        let booking_id = uow.insert_booking(&new_booking(room.id)).await.unwrap();
        assert_ok!(uow.insert_payment(&payment(booking_id, &reference)).await);
        assert_err!(uow.insert_payment(&payment(booking_id, &reference)).await);
    }

    #[tokio::test]
    async fn test_refund_marks_successful_payments() {
        let store = MemoryStore::new(&config(2, 50));
        let room = store.insert_room("101", RoomStatus::Available).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let booking_id = uow.insert_booking(&new_booking(room.id)).await.unwrap();
        uow.insert_payment(&NewPayment {
            booking_id,
            amount: Money::from_str("400.00").unwrap(),
            method: PaymentMethod::Paypal,
            status: PaymentStatus::Success,
            transaction_ref: TransactionRef::generate(),
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let refunded = uow.refund_payments(booking_id).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(refunded, Money::from_str("400.00").unwrap());
        let payments = store.payments_for_booking(booking_id).await.unwrap();
        assert!(payments.iter().all(|p| p.status == PaymentStatus::Refunded));
    }
}
