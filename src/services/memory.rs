use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::core::{
    calculate_bounding_box, has_capacity, has_conflicting_night, is_within_bounding_box,
    is_within_radius, AvailabilityIndex, CapacityStore, Distance, GuestCount, SearchError,
    SpatialIndex, StayRange,
};
use crate::models::{GeoPoint, Listing, ListingId, ReservedNight};
use crate::services::cache::SpatialCache;
use chrono::NaiveDate;

/// Initial contents for an [`InMemoryStore`], usually read from a JSON file
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub listings: Vec<SeedListing>,
    #[serde(default)]
    pub reserved: Vec<ReservedNight>,
}

/// A listing plus its location, if it has been geocoded
#[derive(Debug, Deserialize)]
pub struct SeedListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    listings: HashMap<ListingId, Listing>,
    locations: HashMap<ListingId, GeoPoint>,
    reserved: HashMap<ListingId, BTreeSet<NaiveDate>>,
}

/// In-process store serving all three search leaves
///
/// Every read holds the lock for the whole call, so each leaf query sees a
/// consistent snapshot. Used by tests, benchmarks and `storage = "memory"`
/// deployments.
///
/// Writes that move, add or remove a location return only after an attached
/// spatial cache has been invalidated.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Snapshot>,
    spatial_cache: OnceLock<Arc<SpatialCache>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate `cache` on every location write from now on
    ///
    /// Returns false if a cache was already attached.
    pub fn attach_spatial_cache(&self, cache: Arc<SpatialCache>) -> bool {
        self.spatial_cache.set(cache).is_ok()
    }

    async fn locations_changed(&self) {
        if let Some(cache) = self.spatial_cache.get() {
            // The generation has moved even if the shared tier could not be
            // cleared, so no stale entry is readable
            if let Err(e) = cache.invalidate().await {
                tracing::warn!("Failed to clear cached spatial lookups: {}", e);
            }
        }
    }

    /// Add or replace a listing together with its resolved location
    pub async fn publish_listing(&self, listing: Listing, latitude: f64, longitude: f64) {
        let listing_id = listing.id;
        {
            let mut inner = self.inner.write().await;
            inner.locations.insert(
                listing_id,
                GeoPoint {
                    listing_id,
                    latitude,
                    longitude,
                },
            );
            inner.listings.insert(listing_id, listing);
        }
        self.locations_changed().await;
        tracing::debug!("Published listing {}", listing_id);
    }

    /// Add a listing whose address has not been geocoded yet
    ///
    /// The listing exists but is unsearchable until a location is published.
    pub async fn insert_unlocated_listing(&self, listing: Listing) {
        let had_location = {
            let mut inner = self.inner.write().await;
            let had_location = inner.locations.remove(&listing.id).is_some();
            inner.listings.insert(listing.id, listing);
            had_location
        };
        if had_location {
            self.locations_changed().await;
        }
    }

    /// Remove a listing, its location and its reservations
    pub async fn unpublish_listing(&self, listing_id: ListingId) -> bool {
        let (existed, had_location) = {
            let mut inner = self.inner.write().await;
            let had_location = inner.locations.remove(&listing_id).is_some();
            inner.reserved.remove(&listing_id);
            (inner.listings.remove(&listing_id).is_some(), had_location)
        };
        if had_location {
            self.locations_changed().await;
        }
        existed
    }

    /// Record one occupied night per night of the stay
    pub async fn reserve(&self, listing_id: ListingId, stay: StayRange) {
        let mut inner = self.inner.write().await;
        inner
            .reserved
            .entry(listing_id)
            .or_default()
            .extend(stay.nights());
    }

    /// Record explicit reserved nights
    pub async fn reserve_nights<I>(&self, nights: I)
    where
        I: IntoIterator<Item = ReservedNight>,
    {
        let mut inner = self.inner.write().await;
        for night in nights {
            inner
                .reserved
                .entry(night.listing_id)
                .or_default()
                .insert(night.date);
        }
    }

    /// Release the nights of a cancelled stay
    pub async fn cancel(&self, listing_id: ListingId, stay: StayRange) {
        let mut inner = self.inner.write().await;
        if let Some(nights) = inner.reserved.get_mut(&listing_id) {
            nights.retain(|night| !stay.contains(*night));
            if nights.is_empty() {
                inner.reserved.remove(&listing_id);
            }
        }
    }

    /// Load seed data on top of the current contents
    pub async fn seed(&self, data: SeedData) {
        let listing_count = data.listings.len();
        for seed in data.listings {
            match (seed.latitude, seed.longitude) {
                (Some(latitude), Some(longitude)) => {
                    self.publish_listing(seed.listing, latitude, longitude).await
                }
                _ => self.insert_unlocated_listing(seed.listing).await,
            }
        }
        let night_count = data.reserved.len();
        self.reserve_nights(data.reserved).await;

        tracing::info!("Seeded {} listings and {} reserved nights", listing_count, night_count);
    }

    pub async fn listing_count(&self) -> usize {
        self.inner.read().await.listings.len()
    }
}

#[async_trait]
impl SpatialIndex for InMemoryStore {
    async fn find_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius: Distance,
    ) -> Result<HashSet<ListingId>, SearchError> {
        let inner = self.inner.read().await;
        let bbox = calculate_bounding_box(latitude, longitude, radius.meters());
        let simple_lon = bbox.has_simple_longitude_range();

        let ids = inner
            .locations
            .values()
            .filter(|point| {
                if simple_lon {
                    is_within_bounding_box(point.latitude, point.longitude, &bbox)
                } else {
                    point.latitude >= bbox.min_lat && point.latitude <= bbox.max_lat
                }
            })
            .filter(|point| is_within_radius(point, latitude, longitude, &radius))
            .map(|point| point.listing_id)
            .collect();

        Ok(ids)
    }
}

#[async_trait]
impl AvailabilityIndex for InMemoryStore {
    async fn find_reserved_among(
        &self,
        ids: &HashSet<ListingId>,
        stay: StayRange,
    ) -> Result<HashSet<ListingId>, SearchError> {
        let inner = self.inner.read().await;

        let reserved = ids
            .iter()
            .filter(|id| {
                inner.reserved.get(*id).is_some_and(|nights| {
                    has_conflicting_night(nights.range(stay.checkin()..stay.checkout()), &stay)
                })
            })
            .copied()
            .collect();

        Ok(reserved)
    }
}

#[async_trait]
impl CapacityStore for InMemoryStore {
    async fn find_qualifying(
        &self,
        ids: &HashSet<ListingId>,
        min_guests: GuestCount,
    ) -> Result<Vec<Listing>, SearchError> {
        let inner = self.inner.read().await;

        let listings = ids
            .iter()
            .filter_map(|id| inner.listings.get(id))
            .filter(|listing| has_capacity(listing, min_guests))
            .cloned()
            .collect();

        Ok(listings)
    }
}
