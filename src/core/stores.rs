//! Read-only contracts the search pipeline depends on.
//!
//! Each trait is one leaf of the pipeline. Implementations must be pure reads
//! that observe a consistent snapshot for the duration of a single call, and
//! must report infrastructure failures as [`SearchError::StorageUnavailable`]
//! rather than as an empty result.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Distance, GuestCount, SearchError, StayRange};
use crate::models::{Listing, ListingId};

/// Resolves a point and radius into nearby listings
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Ids of every listing whose location is within `radius` of the point,
    /// boundary inclusive. Listings without a location are never returned.
    async fn find_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius: Distance,
    ) -> Result<HashSet<ListingId>, SearchError>;
}

/// Resolves which listings are already booked during a stay
#[async_trait]
pub trait AvailabilityIndex: Send + Sync {
    /// The subset of `ids` with at least one reserved night in
    /// `[stay.checkin, stay.checkout)`. Only `ids` may be examined.
    async fn find_reserved_among(
        &self,
        ids: &HashSet<ListingId>,
        stay: StayRange,
    ) -> Result<HashSet<ListingId>, SearchError>;
}

/// Resolves listings that can host a party
#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Full records of the listings in `ids` whose capacity is at least
    /// `min_guests`.
    async fn find_qualifying(
        &self,
        ids: &HashSet<ListingId>,
        min_guests: GuestCount,
    ) -> Result<Vec<Listing>, SearchError>;
}

#[async_trait]
impl<T: SpatialIndex + ?Sized> SpatialIndex for Arc<T> {
    async fn find_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius: Distance,
    ) -> Result<HashSet<ListingId>, SearchError> {
        (**self).find_within_radius(latitude, longitude, radius).await
    }
}

#[async_trait]
impl<T: AvailabilityIndex + ?Sized> AvailabilityIndex for Arc<T> {
    async fn find_reserved_among(
        &self,
        ids: &HashSet<ListingId>,
        stay: StayRange,
    ) -> Result<HashSet<ListingId>, SearchError> {
        (**self).find_reserved_among(ids, stay).await
    }
}

#[async_trait]
impl<T: CapacityStore + ?Sized> CapacityStore for Arc<T> {
    async fn find_qualifying(
        &self,
        ids: &HashSet<ListingId>,
        min_guests: GuestCount,
    ) -> Result<Vec<Listing>, SearchError> {
        (**self).find_qualifying(ids, min_guests).await
    }
}
