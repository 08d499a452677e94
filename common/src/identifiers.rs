//! Identifier types for reservation entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares an `i64` newtype key backed by a `BIGSERIAL` column.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw database key.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Unique identifier for a room.
    RoomId
);
row_id!(
    /// Unique identifier for a booking.
    BookingId
);
row_id!(
    /// Unique identifier for a payment.
    PaymentId
);
row_id!(
    /// Reference to the user who owns a booking.
    UserId
);
row_id!(
    /// Unique identifier for an audit log entry.
    LogId
);

/// Payment transaction reference, unique per reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Prefix shared by every generated reference.
    pub const PREFIX: &'static str = "TXN-";

    /// Generate a fresh reference.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4()))
    }

    /// Wrap a reference read back from storage.
    pub fn from_stored(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_roundtrip() {
        let id = RoomId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(RoomId::from(42), id);
    }

    #[test]
    fn test_transaction_refs_are_unique() {
        let a = TransactionRef::generate();
        let b = TransactionRef::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(TransactionRef::PREFIX));
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&BookingId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
