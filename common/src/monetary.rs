//! Monetary amounts for bookings and payments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Decimal places used for stored prices.
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// A monetary amount in the property's billing currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Create a new amount.
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Create from a string value.
    pub fn from_str(value: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Self(value.parse()?))
    }

    /// A zero amount.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Round to the stored price precision.
    pub fn round(&self) -> Self {
        Self(self.0.round_dp(PRICE_DECIMAL_PLACES))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Self::Output {
        Money(self.0 + other.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
