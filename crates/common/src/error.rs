//! Error types for eventix.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A reservation would push the event past its sellable ceiling.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A hold was asked to leave a terminal state.
    #[error("Invalid hold transition: {0}")]
    InvalidHoldTransition(String),

    /// A group registration was asked for a transition its status table forbids.
    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    /// The hold expired before payment arrived; the client has to reserve again.
    #[error("Hold expired: {0}")]
    HoldExpired(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_)
            | Self::CapacityExceeded(_)
            | Self::InvalidHoldTransition(_)
            | Self::InvalidStatusTransition(_) => StatusCode::CONFLICT,
            Self::HoldExpired(_) => StatusCode::GONE,

            // 5xx Server Errors
            Self::Database(_)
            | Self::Queue(_)
            | Self::Config(_)
            | Self::ExternalService(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            Self::InvalidHoldTransition(_) => "INVALID_HOLD_TRANSITION",
            Self::InvalidStatusTransition(_) => "INVALID_STATUS_TRANSITION",
            Self::HoldExpired(_) => "HOLD_EXPIRED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_errors_map_to_conflict_and_gone() {
        assert_eq!(
            AppError::CapacityExceeded("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidHoldTransition("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::HoldExpired("x".into()).status_code(),
            StatusCode::GONE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::CapacityExceeded(String::new()).error_code(),
            "CAPACITY_EXCEEDED"
        );
        assert_eq!(AppError::HoldExpired(String::new()).error_code(), "HOLD_EXPIRED");
        assert!(AppError::Database(String::new()).is_server_error());
        assert!(!AppError::NotFound(String::new()).is_server_error());
    }
}
