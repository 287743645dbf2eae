use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::core::error::SearchError;

/// The nights occupied by a stay: the half-open interval `[checkin, checkout)`
///
/// The checkout day itself is never an occupied night, so a booking that ends
/// on day D and one that starts on day D do not conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StayRange {
    checkin: NaiveDate,
    checkout: NaiveDate,
}

impl StayRange {
    pub fn new(checkin: NaiveDate, checkout: NaiveDate) -> Result<Self, SearchError> {
        if checkout <= checkin {
            return Err(SearchError::InvalidDateRange { checkin, checkout });
        }
        Ok(Self { checkin, checkout })
    }

    pub fn checkin(&self) -> NaiveDate {
        self.checkin
    }

    pub fn checkout(&self) -> NaiveDate {
        self.checkout
    }

    /// Last occupied night (inclusive upper bound of the stay)
    pub fn last_night(&self) -> NaiveDate {
        self.checkout - Duration::days(1)
    }

    pub fn num_nights(&self) -> i64 {
        (self.checkout - self.checkin).num_days()
    }

    /// Whether `night` is occupied by this stay
    #[inline]
    pub fn contains(&self, night: NaiveDate) -> bool {
        night >= self.checkin && night < self.checkout
    }

    /// Every occupied night, in order
    pub fn nights(&self) -> impl Iterator<Item = NaiveDate> {
        let checkout = self.checkout;
        self.checkin
            .iter_days()
            .take_while(move |night| *night < checkout)
    }
}
