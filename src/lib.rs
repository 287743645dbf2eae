//! Stay Search - availability search engine for the Staybooking service
//!
//! Turns a geo-point + radius, a stay-date range and a party size into the
//! exact set of matching listings. The pipeline runs three read-only leaf
//! stores in sequence (spatial, availability, capacity) and stops as soon as
//! a stage comes back empty.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    AvailabilityIndex, CapacityStore, Distance, DistanceUnit, GuestCount, SearchError,
    SearchOrchestrator, SearchQuery, SearchResult, SpatialIndex, StayRange,
};
pub use crate::models::{GeoPoint, Listing, ListingId, ReservedNight};
