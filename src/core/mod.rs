// Core algorithm exports
pub mod distance;
pub mod error;
pub mod filters;
pub mod search;
pub mod stay;
pub mod stores;

pub use distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box, Distance, DistanceUnit};
pub use error::SearchError;
pub use filters::{has_capacity, has_conflicting_night, is_within_radius, GuestCount};
pub use search::{SearchOrchestrator, SearchQuery, SearchResult};
pub use stay::StayRange;
pub use stores::{AvailabilityIndex, CapacityStore, SpatialIndex};
