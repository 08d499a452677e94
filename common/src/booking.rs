//! Persisted room, booking, payment and audit-log rows, and their status
//! state machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    BookingId, LogId, Money, PaymentId, ReservationError, Result, RoomId, StayRange,
    TransactionRef, UserId,
};

/// Room availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    /// Free to be booked.
    Available,
    /// Held by a confirmed booking.
    Occupied,
    /// Out of service.
    Maintenance,
    /// Being prepared after a stay.
    Cleaning,
}

impl RoomStatus {
    /// Convert status to its stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Occupied => "OCCUPIED",
            Self::Maintenance => "MAINTENANCE",
            Self::Cleaning => "CLEANING",
        }
    }

    /// Parse status from its stored representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "OCCUPIED" => Ok(Self::Occupied),
            "MAINTENANCE" => Ok(Self::Maintenance),
            "CLEANING" => Ok(Self::Cleaning),
            _ => Err(ReservationError::StoreFault(format!(
                "Invalid room status: {s}"
            ))),
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created, awaiting confirmation.
    Pending,
    /// Paid and holding the room.
    Confirmed,
    /// Cancelled by the guest or an operator.
    Cancelled,
    /// Stay finished.
    Completed,
    /// Could not be completed.
    Failed,
}

impl BookingStatus {
    /// Convert status to its stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse status from its stored representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ReservationError::StoreFault(format!(
                "Invalid booking status: {s}"
            ))),
        }
    }

    /// Statuses that block other bookings of the same room.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    /// Check if a booking in this status holds its room's dates.
    pub fn holds_room(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Check if a booking in this status may be cancelled.
    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(BookingStatus::Cancelled)
    }

    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[BookingStatus] {
        match self {
            BookingStatus::Pending => &[
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
                BookingStatus::Failed,
            ],
            BookingStatus::Confirmed => &[BookingStatus::Cancelled, BookingStatus::Completed],
            BookingStatus::Cancelled => &[],
            BookingStatus::Completed => &[],
            BookingStatus::Failed => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the guest paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    /// Convert method to its stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "CREDIT_CARD",
            Self::DebitCard => "DEBIT_CARD",
            Self::Paypal => "PAYPAL",
            Self::BankTransfer => "BANK_TRANSFER",
        }
    }

    /// Parse method from its stored representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "CREDIT_CARD" => Ok(Self::CreditCard),
            "DEBIT_CARD" => Ok(Self::DebitCard),
            "PAYPAL" => Ok(Self::Paypal),
            "BANK_TRANSFER" => Ok(Self::BankTransfer),
            _ => Err(ReservationError::StoreFault(format!(
                "Invalid payment method: {s}"
            ))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    /// Convert status to its stored representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse status from its stored representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "REFUNDED" => Ok(Self::Refunded),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(ReservationError::StoreFault(format!(
                "Invalid payment status: {s}"
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookable room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    /// Room identifier.
    pub id: RoomId,
    /// Human-facing room number.
    pub number: String,
    /// Current availability.
    pub status: RoomStatus,
}

/// A booking row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    /// Booked nights.
    pub stay: StayRange,
    pub total_price: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Values for a booking about to be inserted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub stay: StayRange,
    pub total_price: Money,
    pub status: BookingStatus,
}

/// A payment row linked to a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Unique per reservation attempt.
    pub transaction_ref: TransactionRef,
    pub created_at: DateTime<Utc>,
}

/// Values for a payment about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: BookingId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_ref: TransactionRef,
}

/// Append-only audit record for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionLog {
    pub id: LogId,
    pub booking_id: BookingId,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_through_storage_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::Failed,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_eq!(RoomStatus::parse("CLEANING").unwrap(), RoomStatus::Cleaning);
        assert_eq!(
            PaymentMethod::parse("BANK_TRANSFER").unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!(PaymentStatus::parse("success").is_err());
    }

    #[test]
    fn test_serde_matches_storage_text() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CreditCard).unwrap(),
            "\"CREDIT_CARD\""
        );
        assert_eq!(
            serde_json::to_string(&BookingStatus::Confirmed).unwrap(),
            format!("\"{}\"", BookingStatus::Confirmed.as_str())
        );
    }

    #[test]
    fn test_active_statuses_hold_room() {
        assert!(BookingStatus::Pending.holds_room());
        assert!(BookingStatus::Confirmed.holds_room());
        assert!(!BookingStatus::Cancelled.holds_room());
        assert!(!BookingStatus::Completed.holds_room());
        assert!(!BookingStatus::Failed.holds_room());
    }

    #[test]
    fn test_cancellation_transitions() {
        assert!(BookingStatus::Pending.is_cancellable());
        assert!(BookingStatus::Confirmed.is_cancellable());
        assert!(!BookingStatus::Cancelled.is_cancellable());
        assert!(!BookingStatus::Completed.is_cancellable());
        assert!(BookingStatus::Cancelled.is_final());
        assert!(!BookingStatus::Confirmed.can_transition_to(BookingStatus::Pending));
    }
}
