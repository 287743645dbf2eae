// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{BoundingBox, GeoPoint, Listing, ListingId, ReservedNight};
pub use requests::SearchRequest;
pub use responses::{ErrorResponse, HealthResponse};
