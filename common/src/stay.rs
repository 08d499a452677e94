//! Half-open stay ranges and the overlap rule used for conflict detection.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::{ReservationError, Result};

/// A stay from `check_in` (inclusive) to `check_out` (exclusive).
///
/// The guest occupies the room for the nights `check_in .. check_out`, so a
/// stay ending on a date does not conflict with one starting on that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    /// Create a stay; `check_out` must be strictly after `check_in`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self> {
        if check_out <= check_in {
            return Err(ReservationError::InvalidStayRange {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// First night of the stay.
    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    /// Departure date; not occupied.
    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights covered.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Two stays overlap unless one ends on or before the other begins.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        !(self.check_out <= other.check_in || self.check_in >= other.check_out)
    }
}

impl fmt::Display for StayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stay(a: &str, b: &str) -> StayRange {
        StayRange::new(date(a), date(b)).unwrap()
    }

    #[test]
    fn test_partial_overlap_conflicts() {
        let a = stay("2024-01-10", "2024-01-15");
        let b = stay("2024-01-12", "2024-01-20");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_touching_boundary_does_not_conflict() {
        let a = stay("2024-01-10", "2024-01-15");
        let b = stay("2024-01-15", "2024-01-20");
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));

        let c = stay("2024-01-01", "2024-01-05");
        let d = stay("2024-01-05", "2024-01-10");
        assert!(!c.overlaps(&d));
    }

    #[test]
    fn test_containment_conflicts() {
        let outer = stay("2024-03-01", "2024-03-31");
        let inner = stay("2024-03-10", "2024-03-11");
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
        assert!(outer.overlaps(&outer));
    }

    #[test]
    fn test_rejects_empty_and_inverted_ranges() {
        assert!(StayRange::new(date("2024-01-05"), date("2024-01-05")).is_err());
        assert!(matches!(
            StayRange::new(date("2024-01-06"), date("2024-01-05")),
            Err(ReservationError::InvalidStayRange { .. })
        ));
    }

    #[test]
    fn test_nights() {
        assert_eq!(stay("2024-02-27", "2024-03-02").nights(), 4);
    }

    fn arb_stay() -> impl Strategy<Value = StayRange> {
        (0i64..365, 1i64..30).prop_map(|(start, len)| {
            let base = date("2024-01-01");
            let check_in = base + chrono::Duration::days(start);
            StayRange::new(check_in, check_in + chrono::Duration::days(len)).unwrap()
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_stay(), b in arb_stay()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn overlap_matches_shared_nights(a in arb_stay(), b in arb_stay()) {
            let shared = a.check_in().max(b.check_in()) < a.check_out().min(b.check_out());
            prop_assert_eq!(a.overlaps(&b), shared);
        }

        #[test]
        fn adjacent_stays_never_overlap(a in arb_stay(), len in 1i64..30) {
            let next = StayRange::new(a.check_out(), a.check_out() + chrono::Duration::days(len)).unwrap();
            prop_assert!(!a.overlaps(&next));
        }
    }
}
