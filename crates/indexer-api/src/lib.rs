pub mod config;
pub mod routes;
pub mod server;

pub use config::ApiConfig;
pub use server::{ApiServer, AppState};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream provider unavailable: {0}")]
    Upstream(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Database(_) => "database",
            ApiError::Upstream(_) => "upstream",
            ApiError::Server(_) => "server",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));
        (self.status(), body).into_response()
    }
}

impl From<indexer_core::IndexerError> for ApiError {
    fn from(err: indexer_core::IndexerError) -> Self {
        use indexer_core::IndexerError;
        match err {
            IndexerError::Storage(msg) => ApiError::Database(msg),
            IndexerError::Provider(_)
            | IndexerError::NoProviderAvailable
            | IndexerError::Subscription(_) => ApiError::Upstream(err.to_string()),
            other => ApiError::Server(other.to_string()),
        }
    }
}

impl From<indexer_db::DatabaseError> for ApiError {
    fn from(err: indexer_db::DatabaseError) -> Self {
        ApiError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Upstream("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn transient_indexer_errors_become_upstream() {
        let err: ApiError = indexer_core::IndexerError::NoProviderAvailable.into();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
