use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query string of the search endpoint
///
/// `GET /api/v1/search?guest_number=2&checkin_date=2024-06-01&checkout_date=2024-06-03&lat=37.77&lon=-122.41&distance=10km`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(range(min = 1, message = "guest_number must be at least 1"))]
    #[serde(alias = "guestNumber")]
    pub guest_number: i64,
    #[serde(alias = "checkinDate")]
    pub checkin_date: NaiveDate,
    #[serde(alias = "checkoutDate")]
    pub checkout_date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
    /// Radius such as `10km` or `5mi`, the configured default when absent
    #[validate(length(min = 1, max = 32))]
    #[serde(default)]
    pub distance: Option<String>,
}
