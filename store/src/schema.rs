//! PostgreSQL schema for rooms, bookings, payments and the audit log.

/// Statements applied in order by [`crate::PgReservationStore::migrate`].
/// Every statement is idempotent.
pub const STATEMENTS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS rooms (
        id BIGSERIAL PRIMARY KEY,
        number TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'AVAILABLE'
            CHECK (status IN ('AVAILABLE', 'OCCUPIED', 'MAINTENANCE', 'CLEANING'))
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS bookings (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        room_id BIGINT NOT NULL REFERENCES rooms(id),
        check_in DATE NOT NULL,
        check_out DATE NOT NULL,
        total_price NUMERIC(12, 2) NOT NULL,
        status TEXT NOT NULL
            CHECK (status IN ('PENDING', 'CONFIRMED', 'CANCELLED', 'COMPLETED', 'FAILED')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CHECK (check_out > check_in)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_bookings_room_status ON bookings(room_id, status)",
    r"
    CREATE TABLE IF NOT EXISTS payments (
        id BIGSERIAL PRIMARY KEY,
        booking_id BIGINT NOT NULL REFERENCES bookings(id),
        amount NUMERIC(12, 2) NOT NULL,
        method TEXT NOT NULL
            CHECK (method IN ('CREDIT_CARD', 'DEBIT_CARD', 'PAYPAL', 'BANK_TRANSFER')),
        status TEXT NOT NULL
            CHECK (status IN ('PENDING', 'SUCCESS', 'FAILED', 'REFUNDED', 'CANCELLED')),
        transaction_ref TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_payments_booking ON payments(booking_id)",
    r"
    CREATE TABLE IF NOT EXISTS transaction_logs (
        id BIGSERIAL PRIMARY KEY,
        booking_id BIGINT NOT NULL REFERENCES bookings(id),
        details TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_transaction_logs_booking ON transaction_logs(booking_id)",
];
