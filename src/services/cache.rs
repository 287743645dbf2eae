use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Distance, SearchError, SpatialIndex};
use crate::models::ListingId;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Multi-tier cache manager
///
/// L1 is an in-process moka cache, L2 is an optional Redis instance shared
/// across service replicas. Without L2 the manager is purely local.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    /// Create a cache manager backed by Redis
    pub async fn new(redis_url: &str, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        let mut manager = Self::in_memory(l1_size, ttl_secs);
        manager.redis = Some(Arc::new(tokio::sync::Mutex::new(redis)));
        Ok(manager)
    }

    /// Create an L1-only cache manager
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            redis: None,
            l1_cache,
            ttl_secs,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);

                // Populate L1 cache
                self.l1_cache
                    .insert(key.to_string(), json.as_bytes().to_vec())
                    .await;

                return Ok(serde_json::from_str(&json)?);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in cache (both tiers)
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        self.l1_cache
            .insert(key.to_string(), json.as_bytes().to_vec())
            .await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Invalidate all cache entries whose key starts with `prefix`
    ///
    /// Completes only once both tiers have dropped the entries, so callers on
    /// a write path can acknowledge the write afterwards.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        // L1 is per-process and small, clear it entirely
        self.l1_cache.invalidate_all();

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let keys: Vec<String> = redis::cmd("KEYS")
                .arg(format!("{}*", prefix))
                .query_async(&mut *conn)
                .await?;

            if !keys.is_empty() {
                let _: () = redis::cmd("DEL").arg(keys).query_async(&mut *conn).await?;
            }
        }

        tracing::debug!("Invalidated cache prefix: {}", prefix);
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            shared: self.redis.is_some(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
    /// Whether a shared Redis tier is configured
    pub shared: bool,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    pub const SPATIAL_PREFIX: &'static str = "spatial:";

    /// Prefix shared by every radius lookup of one namespace
    pub fn spatial_namespace(namespace: &str) -> String {
        format!("{}{}:", Self::SPATIAL_PREFIX, namespace)
    }

    /// Build a cache key for a radius lookup
    ///
    /// Coordinates are rounded to 1e-6 degrees (about 0.1 m), far below any
    /// meaningful search radius.
    pub fn spatial(
        namespace: &str,
        generation: u64,
        latitude: f64,
        longitude: f64,
        radius: &Distance,
    ) -> String {
        format!(
            "{}{}:{:.6}:{:.6}:{:.3}",
            Self::spatial_namespace(namespace),
            generation,
            latitude,
            longitude,
            radius.meters()
        )
    }
}

/// Invalidation handle for cached radius lookups
///
/// Keys carry the generation current when the lookup started. `invalidate`
/// bumps the generation before returning, so a lookup that read the store
/// before a write can only ever file its result under a key no later lookup
/// asks for. Keys are also namespaced per process so replicas sharing a
/// Redis tier never read each other's entries.
pub struct SpatialCache {
    cache: Arc<CacheManager>,
    namespace: String,
    generation: AtomicU64,
}

impl SpatialCache {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            namespace: uuid::Uuid::new_v4().simple().to_string(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.cache
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn key(&self, generation: u64, latitude: f64, longitude: f64, radius: &Distance) -> String {
        CacheKey::spatial(&self.namespace, generation, latitude, longitude, radius)
    }

    /// Retire every cached radius lookup
    ///
    /// Entries are unreachable as soon as the generation moves; the prefix
    /// delete that follows only reclaims their space.
    pub async fn invalidate(&self) -> Result<(), CacheError> {
        let retired = self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Spatial cache generation {} retired", retired);
        self.cache
            .invalidate_prefix(&CacheKey::spatial_namespace(&self.namespace))
            .await
    }
}

impl std::fmt::Debug for SpatialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialCache")
            .field("namespace", &self.namespace)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

/// Spatial index with a read-through cache in front of it
///
/// Stale spatial data produces wrong search results, so every listing
/// publish/unpublish must await [`SpatialCache::invalidate`] before the
/// write is acknowledged. [`InMemoryStore::attach_spatial_cache`] wires
/// this into the store's own write helpers.
///
/// [`InMemoryStore::attach_spatial_cache`]: crate::services::InMemoryStore::attach_spatial_cache
pub struct CachedSpatialIndex<S> {
    inner: S,
    cache: Arc<SpatialCache>,
}

impl<S: SpatialIndex> CachedSpatialIndex<S> {
    pub fn new(inner: S, cache: Arc<CacheManager>) -> Self {
        Self {
            inner,
            cache: Arc::new(SpatialCache::new(cache)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &CacheManager {
        self.cache.manager()
    }

    /// Handle for the write path
    pub fn spatial_cache(&self) -> Arc<SpatialCache> {
        self.cache.clone()
    }

    /// Drop every cached radius lookup
    pub async fn invalidate(&self) -> Result<(), CacheError> {
        self.cache.invalidate().await
    }
}

#[async_trait]
impl<S: SpatialIndex> SpatialIndex for CachedSpatialIndex<S> {
    async fn find_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius: Distance,
    ) -> Result<HashSet<ListingId>, SearchError> {
        // Fixed before the store is read; an invalidate racing this lookup
        // moves later readers to a fresh key
        let key = self.cache.key(self.cache.generation(), latitude, longitude, &radius);

        match self.cache.manager().get::<HashSet<ListingId>>(&key).await {
            Ok(ids) => return Ok(ids),
            Err(CacheError::CacheMiss(_)) => {}
            Err(e) => tracing::warn!("Spatial cache read failed, querying store: {}", e),
        }

        let ids = self.inner.find_within_radius(latitude, longitude, radius).await?;

        if let Err(e) = self.cache.manager().set(&key, &ids).await {
            tracing::warn!("Failed to cache spatial lookup: {}", e);
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Listing;
    use crate::services::InMemoryStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Notify;

    struct CountingIndex {
        ids: HashSet<ListingId>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpatialIndex for CountingIndex {
        async fn find_within_radius(
            &self,
            _latitude: f64,
            _longitude: f64,
            _radius: Distance,
        ) -> Result<HashSet<ListingId>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.ids.clone())
        }
    }

    fn cached_index() -> CachedSpatialIndex<CountingIndex> {
        let inner = CountingIndex {
            ids: [1, 2].into_iter().collect(),
            calls: AtomicUsize::new(0),
        };
        CachedSpatialIndex::new(inner, Arc::new(CacheManager::in_memory(100, 60)))
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 60)
            .await
            .expect("Failed to create cache");

        cache.set("spatial:test", &vec![1_i64, 2]).await.unwrap();
        let result: Vec<i64> = cache.get("spatial:test").await.unwrap();
        assert_eq!(result, vec![1, 2]);

        cache.invalidate_prefix("spatial:").await.unwrap();
        assert!(cache.get::<Vec<i64>>("spatial:test").await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip_and_stats() {
        let cache = CacheManager::in_memory(100, 60);

        assert!(matches!(cache.get::<String>("k").await, Err(CacheError::CacheMiss(_))));
        cache.set("k", &"v").await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap(), "v");

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert!(!stats.shared);
    }

    #[tokio::test]
    async fn test_repeated_lookup_served_from_cache() {
        let index = cached_index();
        let radius = Distance::kilometers(1.0).unwrap();

        let first = index.find_within_radius(37.77, -122.41, radius).await.unwrap();
        let second = index.find_within_radius(37.77, -122.41, radius).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(index.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_store_read() {
        let index = cached_index();
        let radius = Distance::kilometers(1.0).unwrap();

        index.find_within_radius(37.77, -122.41, radius).await.unwrap();
        index.invalidate().await.unwrap();
        index.find_within_radius(37.77, -122.41, radius).await.unwrap();

        assert_eq!(index.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_key_builder() {
        let radius = Distance::kilometers(1.5).unwrap();
        assert_eq!(
            CacheKey::spatial("a1b2", 3, 37.77, -122.41, &radius),
            "spatial:a1b2:3:37.770000:-122.410000:1500.000"
        );
        assert_eq!(CacheKey::spatial_namespace("a1b2"), "spatial:a1b2:");
    }

    #[tokio::test]
    async fn test_invalidate_moves_generation() {
        let spatial = SpatialCache::new(Arc::new(CacheManager::in_memory(10, 60)));
        assert_eq!(spatial.generation(), 0);

        spatial.invalidate().await.unwrap();
        spatial.invalidate().await.unwrap();
        assert_eq!(spatial.generation(), 2);
    }

    /// Reads the store, then parks until released
    struct GatedIndex {
        store: Arc<InMemoryStore>,
        gated: AtomicBool,
        read_taken: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SpatialIndex for GatedIndex {
        async fn find_within_radius(
            &self,
            latitude: f64,
            longitude: f64,
            radius: Distance,
        ) -> Result<HashSet<ListingId>, SearchError> {
            let ids = self.store.find_within_radius(latitude, longitude, radius).await?;
            if self.gated.swap(false, Ordering::SeqCst) {
                self.read_taken.notify_one();
                self.release.notified().await;
            }
            Ok(ids)
        }
    }

    fn create_listing(id: ListingId) -> Listing {
        Listing {
            id,
            host: "host".to_string(),
            address: format!("{} Pine St", id),
            guest_number: 2,
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_lookup_overlapping_invalidate_does_not_repopulate() {
        let store = Arc::new(InMemoryStore::new());
        store.publish_listing(create_listing(1), 37.77, -122.41).await;

        let cached = Arc::new(CachedSpatialIndex::new(
            GatedIndex {
                store: store.clone(),
                gated: AtomicBool::new(true),
                read_taken: Notify::new(),
                release: Notify::new(),
            },
            Arc::new(CacheManager::in_memory(100, 60)),
        ));
        let radius = Distance::kilometers(1.0).unwrap();

        // Slow lookup takes its snapshot before the write lands
        let slow = {
            let cached = cached.clone();
            tokio::spawn(async move { cached.find_within_radius(37.77, -122.41, radius).await })
        };
        cached.inner().read_taken.notified().await;

        store.publish_listing(create_listing(2), 37.77, -122.41).await;
        cached.invalidate().await.unwrap();

        cached.inner().release.notify_one();
        let in_flight = slow.await.unwrap().unwrap();
        assert_eq!(in_flight, HashSet::from([1]));

        // The in-flight result must not be served after the invalidate
        let after = cached.find_within_radius(37.77, -122.41, radius).await.unwrap();
        assert_eq!(after, HashSet::from([1, 2]));
    }
}
