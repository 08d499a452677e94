//! PostgreSQL store on `sqlx`.
//!
//! Every unit of work is a `sqlx` transaction on a pooled connection. Room and
//! booking locks are `SELECT ... FOR UPDATE`; lock waits are bounded by
//! `SET LOCAL lock_timeout`, and a timed-out wait surfaces as
//! `ReservationError::LockTimeout`. Dropping a [`PgUnitOfWork`] without
//! committing rolls the transaction back and returns the connection to the
//! pool.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, instrument};

use innkeep_common::{
    Booking, BookingId, BookingStatus, LogId, Money, NewBooking, NewPayment, Payment, PaymentId,
    PaymentMethod, PaymentStatus, ReservationError, Result, Room, RoomId, RoomStatus, StayRange,
    TransactionLog, TransactionRef, UserId,
};

use crate::config::StoreConfig;
use crate::schema;
use crate::unit_of_work::{ReservationStore, UnitOfWork};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

const ROOM_COLUMNS: &str = "id, number, status";
const BOOKING_COLUMNS: &str =
    "id, user_id, room_id, check_in, check_out, total_price, status, created_at";
const PAYMENT_COLUMNS: &str =
    "id, booking_id, amount, method, status, transaction_ref, created_at";

/// Map a `sqlx` error onto the reservation taxonomy.
///
/// `context` names what was being done (or which row was being locked) and
/// ends up in the error message.
pub fn map_db_error(context: &str, err: sqlx::Error) -> ReservationError {
    match &err {
        sqlx::Error::PoolTimedOut => ReservationError::PoolTimeout(context.to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
            ReservationError::LockTimeout(context.to_string())
        }
        _ => ReservationError::StoreFault(format!("{context}: {err}")),
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| map_db_error(&format!("decode column {name}"), e))
}

fn room_from_row(row: &PgRow) -> Result<Room> {
    let status: String = column(row, "status")?;
    Ok(Room {
        id: RoomId::new(column(row, "id")?),
        number: column(row, "number")?,
        status: RoomStatus::parse(&status)?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking> {
    let status: String = column(row, "status")?;
    let total_price: Decimal = column(row, "total_price")?;
    Ok(Booking {
        id: BookingId::new(column(row, "id")?),
        user_id: UserId::new(column(row, "user_id")?),
        room_id: RoomId::new(column(row, "room_id")?),
        stay: StayRange::new(column(row, "check_in")?, column(row, "check_out")?)?,
        total_price: Money::new(total_price),
        status: BookingStatus::parse(&status)?,
        created_at: column(row, "created_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment> {
    let method: String = column(row, "method")?;
    let status: String = column(row, "status")?;
    let amount: Decimal = column(row, "amount")?;
    let transaction_ref: String = column(row, "transaction_ref")?;
    Ok(Payment {
        id: PaymentId::new(column(row, "id")?),
        booking_id: BookingId::new(column(row, "booking_id")?),
        amount: Money::new(amount),
        method: PaymentMethod::parse(&method)?,
        status: PaymentStatus::parse(&status)?,
        transaction_ref: TransactionRef::from_stored(transaction_ref),
        created_at: column(row, "created_at")?,
    })
}

fn log_from_row(row: &PgRow) -> Result<TransactionLog> {
    Ok(TransactionLog {
        id: LogId::new(column(row, "id")?),
        booking_id: BookingId::new(column(row, "booking_id")?),
        details: column(row, "details")?,
        created_at: column(row, "created_at")?,
    })
}

/// `SET` does not accept bind parameters. PostgreSQL reads `0` as "wait
/// forever", so sub-millisecond timeouts round up to one millisecond.
fn lock_timeout_statement(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis().max(1))
}

/// PostgreSQL-backed reservation store.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgReservationStore {
    /// Connect a new pool using the given configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(ReservationError::ConfigurationError)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| map_db_error("connect", e))?;

        info!(
            max_connections = config.max_connections,
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            "Connected to PostgreSQL"
        );

        Ok(Self::from_pool(pool, config.lock_timeout))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        for statement in schema::STATEMENTS.iter().copied() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_db_error("migrate", e))?;
        }
        info!(statements = schema::STATEMENTS.len(), "Schema applied");
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    type Unit = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("begin", e))?;

        let statement = lock_timeout_statement(self.lock_timeout);
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("set lock_timeout", e))?;

        Ok(PgUnitOfWork { tx })
    }

    async fn insert_room(&self, number: &str, status: RoomStatus) -> Result<Room> {
        let row = sqlx::query(&format!(
            "INSERT INTO rooms (number, status) VALUES ($1, $2) RETURNING {ROOM_COLUMNS}"
        ))
        .bind(number)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error("insert room", e))?;

        room_from_row(&row)
    }

    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("select room", e))?;

        row.as_ref().map(room_from_row).transpose()
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error("select booking", e))?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE room_id = $1 ORDER BY id"
        ))
        .bind(room_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("select bookings", e))?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn payments_for_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1 ORDER BY id"
        ))
        .bind(booking_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("select payments", e))?;

        rows.iter().map(payment_from_row).collect()
    }

    async fn logs_for_booking(&self, booking_id: BookingId) -> Result<Vec<TransactionLog>> {
        let rows = sqlx::query(
            "SELECT id, booking_id, details, created_at FROM transaction_logs \
             WHERE booking_id = $1 ORDER BY id",
        )
        .bind(booking_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("select transaction logs", e))?;

        rows.iter().map(log_from_row).collect()
    }
}

/// A PostgreSQL transaction holding one pooled connection.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self), level = "debug")]
    async fn lock_room(&mut self, id: RoomId) -> Result<Option<Room>> {
        let row = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error(&format!("room {id}"), e))?;

        debug!(room_id = %id, found = row.is_some(), "Room row locked");
        row.as_ref().map(room_from_row).transpose()
    }

    async fn active_bookings(&mut self, room_id: RoomId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE room_id = $1 AND status IN ('PENDING', 'CONFIRMED') \
             ORDER BY check_in"
        ))
        .bind(room_id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("select active bookings", e))?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<BookingId> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO bookings (user_id, room_id, check_in, check_out, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(booking.user_id.get())
        .bind(booking.room_id.get())
        .bind(booking.stay.check_in())
        .bind(booking.stay.check_out())
        .bind(booking.total_price.value())
        .bind(booking.status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("insert booking", e))?;

        Ok(BookingId::new(id))
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<PaymentId> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO payments (booking_id, amount, method, status, transaction_ref)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(payment.booking_id.get())
        .bind(payment.amount.value())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(payment.transaction_ref.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("insert payment", e))?;

        Ok(PaymentId::new(id))
    }

    async fn set_room_status(&mut self, id: RoomId, status: RoomStatus) -> Result<()> {
        let result = sqlx::query("UPDATE rooms SET status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_db_error(&format!("room {id}"), e))?;

        if result.rows_affected() != 1 {
            return Err(ReservationError::StoreFault(format!(
                "update room {id}: {} rows affected",
                result.rows_affected()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_db_error(&format!("booking {id}"), e))?;

        debug!(booking_id = %id, found = row.is_some(), "Booking row locked");
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn set_booking_status(&mut self, id: BookingId, status: BookingStatus) -> Result<()> {
        let result = sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_db_error(&format!("booking {id}"), e))?;

        if result.rows_affected() != 1 {
            return Err(ReservationError::StoreFault(format!(
                "update booking {id}: {} rows affected",
                result.rows_affected()
            )));
        }
        Ok(())
    }

    async fn refund_payments(&mut self, booking_id: BookingId) -> Result<Money> {
        let amounts: Vec<Decimal> = sqlx::query_scalar(
            r"
            UPDATE payments SET status = 'REFUNDED'
            WHERE booking_id = $1 AND status = 'SUCCESS'
            RETURNING amount
            ",
        )
        .bind(booking_id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("refund payments", e))?;

        Ok(amounts.into_iter().map(Money::new).sum())
    }

    async fn append_log(&mut self, booking_id: BookingId, details: &str) -> Result<LogId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO transaction_logs (booking_id, details) VALUES ($1, $2) RETURNING id",
        )
        .bind(booking_id.get())
        .bind(details)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_db_error("append transaction log", e))?;

        Ok(LogId::new(id))
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_db_error("commit", e))
    }

    async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_db_error("rollback", e))
    }
}
