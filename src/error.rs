//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Syntactically invalid coordinate, rejected before any claim attempt
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Conflict (duplicate coordinate, or an operation racing an in-flight refresh)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Transient failure talking to the remote artifact repository (retryable)
    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(String),

    /// Dependency cycle found during closure computation
    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg.clone()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database operation failed".to_string(),
            ),
            AppError::Migration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MIGRATION_ERROR",
                "Database migration failed".to_string(),
            ),
            AppError::InvalidCoordinate(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_COORDINATE", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::RepositoryUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "REPOSITORY_UNAVAILABLE", msg.clone())
            }
            AppError::DependencyCycle(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DEPENDENCY_CYCLE",
                msg.clone(),
            ),
            AppError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                "IO operation failed".to_string(),
            ),
            AppError::AddrParse(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ADDR_PARSE_ERROR",
                "Invalid address".to_string(),
            ),
            AppError::Json(_) => (
                StatusCode::BAD_REQUEST,
                "JSON_ERROR",
                "Invalid JSON".to_string(),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        // Log the error
        tracing::error!(error = %self, code = code, "Request error");

        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl AppError {
    /// Whether a failed refresh unit driven by the queue should be retried.
    ///
    /// Invalid coordinates are never retried; transient repository and
    /// database failures are.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AppError::InvalidCoordinate(_))
    }
}
