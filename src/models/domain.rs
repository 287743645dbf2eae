use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Listing identifier (the `stays.id` primary key)
pub type ListingId = i64;

/// A bookable unit of lodging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    /// Username of the owning host
    pub host: String,
    /// Postal address, display only
    pub address: String,
    /// Maximum number of occupants
    #[serde(rename = "guestNumber")]
    pub guest_number: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Resolved location of a listing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "listingId")]
    pub listing_id: ListingId,
    pub latitude: f64,
    pub longitude: f64,
}

/// One occupied night of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservedNight {
    #[serde(rename = "listingId")]
    pub listing_id: ListingId,
    pub date: NaiveDate,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Whether the longitude bounds are usable as a plain `BETWEEN` range.
    ///
    /// Boxes that reach a pole or cross the antimeridian wrap around, so only
    /// the latitude bounds can be trusted for pre-filtering.
    pub fn has_simple_longitude_range(&self) -> bool {
        self.min_lat > -90.0
            && self.max_lat < 90.0
            && self.min_lon >= -180.0
            && self.max_lon <= 180.0
    }
}
