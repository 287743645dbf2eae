// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedSpatialIndex, SpatialCache};
pub use memory::{InMemoryStore, SeedData, SeedListing};
pub use postgres::PostgresClient;
