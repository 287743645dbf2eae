use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can abort a search
///
/// An empty result is never represented here: every variant means the search
/// could not produce a trustworthy answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("Malformed distance: {0}")]
    MalformedDistance(String),

    #[error("Invalid date range: checkout {checkout} must be after checkin {checkin}")]
    InvalidDateRange {
        checkin: NaiveDate,
        checkout: NaiveDate,
    },

    #[error("Invalid capacity: at least 1 guest required, got {0}")]
    InvalidCapacity(i64),

    #[error("Invalid coordinates: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl SearchError {
    /// True for errors caused by the request itself rather than the stores
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SearchError::StorageUnavailable(_))
    }

    /// Short machine-readable kind, used in error responses and logs
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::MalformedDistance(_) => "malformed_distance",
            SearchError::InvalidDateRange { .. } => "invalid_date_range",
            SearchError::InvalidCapacity(_) => "invalid_capacity",
            SearchError::InvalidCoordinates { .. } => "invalid_coordinates",
            SearchError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<sqlx::Error> for SearchError {
    fn from(err: sqlx::Error) -> Self {
        SearchError::StorageUnavailable(err.to_string())
    }
}
