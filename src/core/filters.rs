use serde::Serialize;

use crate::core::{distance::haversine_distance, error::SearchError, stay::StayRange, Distance};
use crate::models::{GeoPoint, Listing};
use chrono::NaiveDate;

/// Minimum party size for a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GuestCount(u32);

impl GuestCount {
    pub fn new(guests: i64) -> Result<Self, SearchError> {
        if guests < 1 {
            return Err(SearchError::InvalidCapacity(guests));
        }
        u32::try_from(guests)
            .map(Self)
            .map_err(|_| SearchError::InvalidCapacity(guests))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Check if a geo point lies within `radius` of the center (inclusive)
///
/// Spatial stage: exact great-circle check, applied after any bounding box
/// pre-filter.
#[inline]
pub fn is_within_radius(point: &GeoPoint, center_lat: f64, center_lon: f64, radius: &Distance) -> bool {
    haversine_distance(center_lat, center_lon, point.latitude, point.longitude) <= radius.meters()
}

/// Check if any of a listing's reserved nights falls inside the stay
///
/// Availability stage: one conflicting night is enough to exclude a listing.
#[inline]
pub fn has_conflicting_night<'a, I>(nights: I, stay: &StayRange) -> bool
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    nights.into_iter().any(|night| stay.contains(*night))
}

/// Check if a listing can host the party
///
/// Capacity stage.
#[inline]
pub fn has_capacity(listing: &Listing, guests: GuestCount) -> bool {
    listing.guest_number >= guests.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_listing(guest_number: u32) -> Listing {
        Listing {
            id: 1,
            host: "host".to_string(),
            address: "1 Test St".to_string(),
            guest_number,
            images: vec![],
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_guest_count_bounds() {
        assert!(matches!(GuestCount::new(0), Err(SearchError::InvalidCapacity(0))));
        assert!(GuestCount::new(-3).is_err());
        assert_eq!(GuestCount::new(1).unwrap().get(), 1);
        assert!(GuestCount::new(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_capacity_is_inclusive() {
        let listing = create_test_listing(4);

        assert!(has_capacity(&listing, GuestCount::new(4).unwrap()));
        assert!(has_capacity(&listing, GuestCount::new(2).unwrap()));
        assert!(!has_capacity(&listing, GuestCount::new(5).unwrap()));
    }

    #[test]
    fn test_conflicting_nights() {
        let stay = StayRange::new(date(1), date(3)).unwrap();

        assert!(has_conflicting_night(&[date(2)], &stay));
        assert!(has_conflicting_night(&[date(1)], &stay));
        assert!(!has_conflicting_night(&[date(3), date(10)], &stay));
        assert!(!has_conflicting_night(&[], &stay));
    }

    #[test]
    fn test_radius_check() {
        let point = GeoPoint { listing_id: 1, latitude: 37.77, longitude: -122.41 };
        let radius = Distance::kilometers(1.0).unwrap();

        assert!(is_within_radius(&point, 37.77, -122.41, &radius));
        assert!(!is_within_radius(&point, 38.0, -122.41, &radius));
    }
}
