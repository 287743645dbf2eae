use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::Instrument;

use crate::core::{
    distance::check_coordinates,
    stores::{AvailabilityIndex, CapacityStore, SpatialIndex},
    Distance, GuestCount, SearchError, StayRange,
};
use crate::models::{Listing, ListingId};

/// Arguments of a search, as received from the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchQuery {
    pub min_guests: i64,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Distance,
}

/// Result of the search pipeline with per-stage counts
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub listings: Vec<Listing>,
    /// Listings inside the radius
    pub total_candidates: usize,
    /// Candidates with no reserved night during the stay
    pub total_available: usize,
}

impl SearchResult {
    fn empty(total_candidates: usize) -> Self {
        Self {
            listings: Vec::new(),
            total_candidates,
            total_available: 0,
        }
    }
}

/// Main search orchestrator - sequences the three leaf stores
///
/// # Pipeline Stages
/// 1. Spatial: listings within the radius
/// 2. Availability: drop candidates with a reserved night in the stay
/// 3. Capacity: fetch the remaining listings that fit the party
///
/// Each stage only sees the survivors of the previous one, and an empty
/// stage ends the search without touching the later stores.
#[derive(Clone)]
pub struct SearchOrchestrator {
    spatial: Arc<dyn SpatialIndex>,
    availability: Arc<dyn AvailabilityIndex>,
    capacity: Arc<dyn CapacityStore>,
}

impl SearchOrchestrator {
    pub fn new(
        spatial: Arc<dyn SpatialIndex>,
        availability: Arc<dyn AvailabilityIndex>,
        capacity: Arc<dyn CapacityStore>,
    ) -> Self {
        Self {
            spatial,
            availability,
            capacity,
        }
    }

    /// Build an orchestrator whose three leaves are served by one store
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: SpatialIndex + AvailabilityIndex + CapacityStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    /// Find every listing matching the query, in no particular order
    pub async fn search(&self, query: SearchQuery) -> Result<Vec<Listing>, SearchError> {
        self.search_detailed(query).await.map(|result| result.listings)
    }

    /// Run the pipeline and report how many listings survived each stage
    pub async fn search_detailed(&self, query: SearchQuery) -> Result<SearchResult, SearchError> {
        // Reject bad input before any store is touched
        let guests = GuestCount::new(query.min_guests)?;
        let stay = StayRange::new(query.checkin, query.checkout)?;
        check_coordinates(query.latitude, query.longitude)?;

        let span = tracing::debug_span!(
            "search",
            search_id = %uuid::Uuid::new_v4(),
            radius = %query.radius,
            guests = guests.get(),
            nights = stay.num_nights(),
        );

        self.run(query, guests, stay).instrument(span).await
    }

    async fn run(
        &self,
        query: SearchQuery,
        guests: GuestCount,
        stay: StayRange,
    ) -> Result<SearchResult, SearchError> {
        // Stage 1: spatial candidates
        let candidates = self
            .spatial
            .find_within_radius(query.latitude, query.longitude, query.radius)
            .await?;

        if candidates.is_empty() {
            tracing::debug!("No listings within radius");
            return Ok(SearchResult::empty(0));
        }

        let total_candidates = candidates.len();

        // Stage 2: subtract listings with a reserved night in the stay
        let reserved = self
            .availability
            .find_reserved_among(&candidates, stay)
            .await?;

        let available: HashSet<ListingId> = candidates.difference(&reserved).copied().collect();

        tracing::debug!(
            candidates = total_candidates,
            reserved = reserved.len(),
            available = available.len(),
            "Availability filtered"
        );

        if available.is_empty() {
            return Ok(SearchResult::empty(total_candidates));
        }

        let total_available = available.len();

        // Stage 3: capacity, on the smallest remaining set
        let listings = self.capacity.find_qualifying(&available, guests).await?;

        tracing::debug!(results = listings.len(), "Search complete");

        Ok(SearchResult {
            listings,
            total_candidates,
            total_available,
        })
    }
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator").finish_non_exhaustive()
    }
}
