use actix_cors::Cors;
use actix_web::{
    error, http::StatusCode, middleware, web, App, HttpRequest, HttpResponse, HttpServer,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stay_search::config::{CacheSettings, LoggingSettings, Settings, StorageBackend};
use stay_search::core::{AvailabilityIndex, CapacityStore, SearchOrchestrator, SpatialIndex};
use stay_search::models::ErrorResponse;
use stay_search::routes::{self, search::AppState};
use stay_search::services::{
    CacheManager, CachedSpatialIndex, InMemoryStore, PostgresClient, SeedData,
};

/// Query string that could not be deserialized into a search request
#[derive(Debug)]
struct QueryRejection(ErrorResponse);

impl std::fmt::Display for QueryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.0.error, self.0.message)
    }
}

impl error::ResponseError for QueryRejection {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(&self.0)
    }
}

/// Answer malformed query strings with the same JSON body as other rejections
fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    info!("Query payload error on {}: {}", req.path(), err);
    QueryRejection(ErrorResponse::new(
        "invalid_query",
        format!("Invalid query: {}", err),
        StatusCode::BAD_REQUEST.as_u16(),
    ))
    .into()
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.json().init(),
    }
}

/// Put a spatial cache in front of the in-memory store when enabled
///
/// The store invalidates the cache on each of its location writes.
async fn memory_spatial_index(
    store: Arc<InMemoryStore>,
    settings: &CacheSettings,
) -> Arc<dyn SpatialIndex> {
    if !settings.enabled {
        return store;
    }

    let ttl = settings.ttl_secs.unwrap_or(300);
    let l1_size = settings.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.redis_url {
        Some(url) => match CacheManager::new(url, l1_size, ttl).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Failed to connect to Redis ({}), caching in-process only", e);
                CacheManager::in_memory(l1_size, ttl)
            }
        },
        None => CacheManager::in_memory(l1_size, ttl),
    };

    let cached = CachedSpatialIndex::new(store.clone(), Arc::new(cache));
    store.attach_spatial_cache(cached.spatial_cache());

    info!("Spatial cache enabled (L1: {} entries, TTL: {}s)", l1_size, ttl);
    Arc::new(cached)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load()
        .and_then(|settings| settings.validate().map(|_| settings))
        .map_err(|e| {
            eprintln!("Configuration error: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?;

    init_tracing(&settings.logging);
    info!("Starting Stay Search service...");

    let (orchestrator, postgres) = match settings.storage {
        StorageBackend::Postgres => {
            let postgres = Arc::new(
                PostgresClient::from_settings(&settings.database)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {}", e);
                        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                    })?,
            );
            info!(
                "PostgreSQL client initialized (max: {} connections)",
                settings.database.max_connections.unwrap_or(10)
            );

            let spatial: Arc<dyn SpatialIndex> = postgres.clone();
            let availability: Arc<dyn AvailabilityIndex> = postgres.clone();
            let capacity: Arc<dyn CapacityStore> = postgres.clone();
            (SearchOrchestrator::new(spatial, availability, capacity), Some(postgres))
        }
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryStore::new());
            match &settings.memory.seed_file {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path).await?;
                    let seed = SeedData::from_json(&json).map_err(|e| {
                        error!("Invalid seed file {}: {}", path, e);
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
                    })?;
                    store.seed(seed).await;
                }
                None => warn!("Using an empty in-memory store: searches will return no listings"),
            }
            let spatial = memory_spatial_index(store.clone(), &settings.cache).await;
            let availability: Arc<dyn AvailabilityIndex> = store.clone();
            let capacity: Arc<dyn CapacityStore> = store;
            (SearchOrchestrator::new(spatial, availability, capacity), None)
        }
    };

    let app_state = AppState {
        orchestrator,
        search: settings.search.clone(),
        postgres,
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
