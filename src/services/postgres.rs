use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::core::{
    calculate_bounding_box, is_within_radius, AvailabilityIndex, CapacityStore, Distance,
    GuestCount, SearchError, SpatialIndex, StayRange,
};
use crate::models::{GeoPoint, Listing, ListingId};

/// PostgreSQL client serving the three search leaves
///
/// Reads the tables owned by the listing and booking services:
/// `stays`, `stay_images`, `locations` and `stay_reserved_dates`.
/// Every failure surfaces as [`SearchError::StorageUnavailable`].
#[derive(Debug, Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, SearchError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SearchError::StorageUnavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(settings: &crate::config::DatabaseSettings) -> Result<Self, SearchError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Wrap an existing pool (migrations are assumed to have run)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, SearchError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn load_images(&self, ids: &[ListingId]) -> Result<HashMap<ListingId, Vec<String>>, SearchError> {
        let query = r#"
            SELECT stay_id, url
            FROM stay_images
            WHERE stay_id = ANY($1)
            ORDER BY stay_id, url
        "#;

        let rows = sqlx::query(query).bind(ids).fetch_all(&self.pool).await?;

        let mut images: HashMap<ListingId, Vec<String>> = HashMap::new();
        for row in &rows {
            images
                .entry(row.try_get("stay_id")?)
                .or_default()
                .push(row.try_get("url")?);
        }
        Ok(images)
    }
}

#[async_trait]
impl SpatialIndex for PostgresClient {
    /// Bounding box pre-filter in SQL, exact haversine check in process
    async fn find_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius: Distance,
    ) -> Result<HashSet<ListingId>, SearchError> {
        let bbox = calculate_bounding_box(latitude, longitude, radius.meters());

        let rows = if bbox.has_simple_longitude_range() {
            let query = r#"
                SELECT stay_id, latitude, longitude
                FROM locations
                WHERE latitude BETWEEN $1 AND $2
                  AND longitude BETWEEN $3 AND $4
            "#;
            sqlx::query(query)
                .bind(bbox.min_lat)
                .bind(bbox.max_lat)
                .bind(bbox.min_lon)
                .bind(bbox.max_lon)
                .fetch_all(&self.pool)
                .await?
        } else {
            let query = r#"
                SELECT stay_id, latitude, longitude
                FROM locations
                WHERE latitude BETWEEN $1 AND $2
            "#;
            sqlx::query(query)
                .bind(bbox.min_lat)
                .bind(bbox.max_lat)
                .fetch_all(&self.pool)
                .await?
        };

        let mut ids = HashSet::with_capacity(rows.len());
        for row in &rows {
            let point = GeoPoint {
                listing_id: row.try_get("stay_id")?,
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
            };
            if is_within_radius(&point, latitude, longitude, &radius) {
                ids.insert(point.listing_id);
            }
        }

        tracing::debug!("{} of {} boxed locations within {}", ids.len(), rows.len(), radius);
        Ok(ids)
    }
}

#[async_trait]
impl AvailabilityIndex for PostgresClient {
    async fn find_reserved_among(
        &self,
        ids: &HashSet<ListingId>,
        stay: StayRange,
    ) -> Result<HashSet<ListingId>, SearchError> {
        let ids: Vec<ListingId> = ids.iter().copied().collect();

        // Half-open: the checkout day is not an occupied night
        let query = r#"
            SELECT DISTINCT stay_id
            FROM stay_reserved_dates
            WHERE stay_id = ANY($1)
              AND date >= $2
              AND date < $3
        "#;

        let rows = sqlx::query(query)
            .bind(&ids)
            .bind(stay.checkin())
            .bind(stay.checkout())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<ListingId, _>("stay_id").map_err(SearchError::from))
            .collect()
    }
}

#[async_trait]
impl CapacityStore for PostgresClient {
    async fn find_qualifying(
        &self,
        ids: &HashSet<ListingId>,
        min_guests: GuestCount,
    ) -> Result<Vec<Listing>, SearchError> {
        let Some(min_guests) = guest_bound(min_guests) else {
            // No INTEGER capacity can hold a party this large
            return Ok(Vec::new());
        };
        let ids: Vec<ListingId> = ids.iter().copied().collect();

        let query = r#"
            SELECT id, host, address, guest_number
            FROM stays
            WHERE id = ANY($1)
              AND guest_number >= $2
        "#;

        let rows = sqlx::query(query)
            .bind(&ids)
            .bind(min_guests)
            .fetch_all(&self.pool)
            .await?;

        let qualifying: Vec<ListingId> = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<Result<_, _>>()?;
        let mut images = self.load_images(&qualifying).await?;

        rows.iter()
            .map(|row| -> Result<Listing, SearchError> {
                let id: ListingId = row.try_get("id")?;
                Ok(Listing {
                    id,
                    host: row.try_get("host")?,
                    address: row.try_get("address")?,
                    guest_number: decode_capacity(id, row.try_get("guest_number")?)?,
                    images: images.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Party size as a bind value for the INTEGER `guest_number` column
fn guest_bound(min_guests: GuestCount) -> Option<i32> {
    i32::try_from(min_guests.get()).ok()
}

fn decode_capacity(id: ListingId, guest_number: i32) -> Result<u32, SearchError> {
    u32::try_from(guest_number).map_err(|_| {
        SearchError::StorageUnavailable(format!(
            "stay {} has invalid guest_number {}",
            id, guest_number
        ))
    })
}
