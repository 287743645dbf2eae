use std::fmt;
use std::str::FromStr;

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::core::error::SearchError;
use crate::models::BoundingBox;

/// Mean earth radius in meters, as used by `geo`'s haversine implementation
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Slack added to bounding boxes so points exactly on the radius survive
/// floating point rounding in the pre-filter
const BBOX_EPSILON_DEG: f64 = 1e-6;

/// Great-circle distance between two points in meters
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Point::new(lon1, lat1).haversine_distance(&Point::new(lon2, lat2))
}

/// Calculate a bounding box that contains every point within `radius_m` of
/// the center
///
/// Used as a cheap pre-filter before the exact haversine check. The longitude
/// span uses the spherical cap extent, so the box is a true superset of the
/// circle even at high latitudes.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_m: f64) -> BoundingBox {
    let angular = radius_m / EARTH_RADIUS_M;
    let lat_delta = angular.to_degrees() + BBOX_EPSILON_DEG;

    let cos_lat = lat.to_radians().cos();
    let lon_delta = if angular.sin() >= cos_lat {
        // The circle contains a pole: every longitude is reachable
        180.0
    } else {
        (angular.sin() / cos_lat).asin().to_degrees() + BBOX_EPSILON_DEG
    };

    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}

/// Reject coordinates that cannot describe a point on earth
pub fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), SearchError> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);

    if valid {
        Ok(())
    } else {
        Err(SearchError::InvalidCoordinates { latitude, longitude })
    }
}

/// Unit of a search radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "m")]
    Meters,
}

impl DistanceUnit {
    pub fn meters_per_unit(self) -> f64 {
        match self {
            DistanceUnit::Kilometers => 1_000.0,
            DistanceUnit::Miles => 1_609.344,
            DistanceUnit::Meters => 1.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Meters => "m",
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Ok(DistanceUnit::Kilometers)
            }
            "mi" | "mile" | "miles" => Ok(DistanceUnit::Miles),
            "m" | "meter" | "meters" | "metre" | "metres" => Ok(DistanceUnit::Meters),
            "" => Err(SearchError::MalformedDistance("missing distance unit".to_string())),
            other => Err(SearchError::MalformedDistance(format!(
                "unrecognized distance unit '{}'",
                other
            ))),
        }
    }
}

/// A validated search radius
///
/// Construction guarantees a finite, strictly positive magnitude, so every
/// `Distance` converts to a usable radius in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distance {
    magnitude: f64,
    unit: DistanceUnit,
}

impl Distance {
    pub fn new(magnitude: f64, unit: DistanceUnit) -> Result<Self, SearchError> {
        if !magnitude.is_finite() || magnitude <= 0.0 {
            return Err(SearchError::MalformedDistance(format!(
                "distance must be a positive number, got {}",
                magnitude
            )));
        }
        Ok(Self { magnitude, unit })
    }

    /// Build a distance from a magnitude and a unit symbol such as `"km"`
    pub fn from_parts(magnitude: f64, unit: &str) -> Result<Self, SearchError> {
        Self::new(magnitude, unit.parse()?)
    }

    pub fn kilometers(magnitude: f64) -> Result<Self, SearchError> {
        Self::new(magnitude, DistanceUnit::Kilometers)
    }

    pub fn miles(magnitude: f64) -> Result<Self, SearchError> {
        Self::new(magnitude, DistanceUnit::Miles)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    /// The radius in the internal comparison unit
    pub fn meters(&self) -> f64 {
        self.magnitude * self.unit.meters_per_unit()
    }

    pub fn kilometers_value(&self) -> f64 {
        self.meters() / 1_000.0
    }
}

impl FromStr for Distance {
    type Err = SearchError;

    /// Parse strings such as `10km`, `2.5 mi` or `500 meters`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let magnitude: f64 = number.trim().parse().map_err(|_| {
            SearchError::MalformedDistance(format!("'{}' is not a distance", trimmed))
        })?;

        Self::from_parts(magnitude, unit)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.symbol())
    }
}
