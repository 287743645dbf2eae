use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::config::SearchSettings;
use crate::core::{SearchError, SearchOrchestrator, SearchQuery};
use crate::models::{ErrorResponse, HealthResponse, SearchRequest};
use crate::services::PostgresClient;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SearchOrchestrator,
    pub search: SearchSettings,
    /// Present when the leaves are served by PostgreSQL
    pub postgres: Option<Arc<PostgresClient>>,
}

/// Configure all search-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/search", web::get().to(search));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match &state.postgres {
        Some(postgres) => postgres.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };
    let storage = if state.postgres.is_some() { "postgres" } else { "memory" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        storage: storage.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Map a pipeline error onto an HTTP response
pub fn error_response(err: &SearchError) -> HttpResponse {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status).json(ErrorResponse::new(err.kind(), err.to_string(), status.as_u16()))
}

/// Search endpoint
///
/// GET /api/v1/search?guest_number=2&checkin_date=2024-06-01&checkout_date=2024-06-03&lat=37.77&lon=-122.41&distance=10km
///
/// Responds with the matching listings as a JSON array, in no particular order.
async fn search(
    state: web::Data<AppState>,
    req: web::Query<SearchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for search request: {:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "validation_failed",
            errors.to_string(),
            StatusCode::BAD_REQUEST.as_u16(),
        ));
    }

    let radius = match state.search.resolve_distance(req.distance.as_deref()) {
        Ok(radius) => radius,
        Err(e) => return error_response(&e),
    };

    let query = SearchQuery {
        min_guests: req.guest_number,
        checkin: req.checkin_date,
        checkout: req.checkout_date,
        latitude: req.lat,
        longitude: req.lon,
        radius,
    };

    match state.orchestrator.search_detailed(query).await {
        Ok(result) => {
            tracing::info!(
                "Returning {} listings ({} in radius, {} available) within {} of ({}, {})",
                result.listings.len(),
                result.total_candidates,
                result.total_available,
                radius,
                req.lat,
                req.lon
            );
            HttpResponse::Ok().json(result.listings)
        }
        Err(e) if e.is_client_error() => {
            tracing::info!("Rejected search: {}", e);
            error_response(&e)
        }
        Err(e) => {
            tracing::error!("Search failed: {}", e);
            error_response(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let bad = error_response(&SearchError::InvalidCapacity(0));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let down = error_response(&SearchError::StorageUnavailable("pool timed out".to_string()));
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
