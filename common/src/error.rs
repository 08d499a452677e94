//! Error types for reservation operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::{BookingId, BookingStatus, Money, RoomId};

/// Main error type for reservation operations.
#[derive(Error, Debug)]
pub enum ReservationError {
    /// The room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// The booking does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// An active booking already holds part of the requested stay.
    #[error("Room {room_id} already booked by booking {conflicting}")]
    RoomAlreadyBooked {
        room_id: RoomId,
        conflicting: BookingId,
    },

    /// Waiting for a row lock exceeded the configured lock timeout.
    #[error("Lock wait timed out on {0}")]
    LockTimeout(String),

    /// The booking was already cancelled.
    #[error("Booking {0} already cancelled")]
    AlreadyCancelled(BookingId),

    /// The booking is in a terminal state other than cancelled.
    #[error("Booking {booking_id} cannot be cancelled from {status}")]
    NotCancellable {
        booking_id: BookingId,
        status: BookingStatus,
    },

    /// Check-out is not after check-in.
    #[error("Invalid stay: check-out {check_out} must be after check-in {check_in}")]
    InvalidStayRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    /// The payment amount is not positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// No pooled connection became available in time.
    #[error("Connection pool timed out: {0}")]
    PoolTimeout(String),

    /// Unexpected store failure (connection loss, constraint violation).
    #[error("Store fault: {0}")]
    StoreFault(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ReservationError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReservationError::LockTimeout(_) | ReservationError::PoolTimeout(_)
        )
    }

    /// Get suggested retry delay in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ReservationError::LockTimeout(_) => Some(100),
            ReservationError::PoolTimeout(_) => Some(250),
            _ => None,
        }
    }

    /// Business-rule rejections are detected before anything is written.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            ReservationError::RoomNotFound(_)
                | ReservationError::BookingNotFound(_)
                | ReservationError::RoomAlreadyBooked { .. }
                | ReservationError::AlreadyCancelled(_)
                | ReservationError::NotCancellable { .. }
                | ReservationError::InvalidStayRange { .. }
                | ReservationError::InvalidAmount(_)
        )
    }

    /// Get error code for callers translating to their own protocol.
    pub fn error_code(&self) -> &'static str {
        match self {
            ReservationError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            ReservationError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            ReservationError::RoomAlreadyBooked { .. } => "ROOM_ALREADY_BOOKED",
            ReservationError::LockTimeout(_) => "LOCK_TIMEOUT",
            ReservationError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            ReservationError::NotCancellable { .. } => "NOT_CANCELLABLE",
            ReservationError::InvalidStayRange { .. } => "INVALID_STAY_RANGE",
            ReservationError::InvalidAmount(_) => "INVALID_AMOUNT",
            ReservationError::PoolTimeout(_) => "POOL_TIMEOUT",
            ReservationError::StoreFault(_) => "STORE_FAULT",
            ReservationError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for reservation operations.
pub type Result<T> = std::result::Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ReservationError::LockTimeout("room 1".into()).is_retryable());
        assert!(ReservationError::PoolTimeout("acquire".into()).is_retryable());
        assert!(!ReservationError::RoomNotFound(RoomId::new(1)).is_retryable());
        assert!(!ReservationError::StoreFault("boom".into()).is_retryable());
        assert!(!ReservationError::AlreadyCancelled(BookingId::new(1)).is_retryable());
    }

    #[test]
    fn test_business_rejections_exclude_faults() {
        let conflict = ReservationError::RoomAlreadyBooked {
            room_id: RoomId::new(1),
            conflicting: BookingId::new(9),
        };
        assert!(conflict.is_business_rejection());
        assert!(!ReservationError::StoreFault("lost".into()).is_business_rejection());
        assert!(!ReservationError::LockTimeout("room 1".into()).is_business_rejection());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ReservationError::RoomNotFound(RoomId::new(3)).error_code(),
            "ROOM_NOT_FOUND"
        );
        assert_eq!(
            ReservationError::AlreadyCancelled(BookingId::new(3)).error_code(),
            "ALREADY_CANCELLED"
        );
        assert_eq!(ReservationError::LockTimeout("x".into()).retry_after_ms(), Some(100));
    }
}
