use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Common error types used across the application.
///
/// The operator-facing variants carry a stable error code surfaced in API
/// responses so the admin front end can branch on them.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Too late: {0}")]
    TooLate(String),

    #[error("Cooldown active: {0}")]
    CooldownActive(String),

    #[error("Parcel not found: {0}")]
    ParcelNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the admin front end.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidAction(_) => "INVALID_ACTION",
            AppError::TooLate(_) => "TOO_LATE",
            AppError::CooldownActive(_) => "COOLDOWN_ACTIVE",
            AppError::ParcelNotFound(_) => "PARCEL_NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidAction(_) => StatusCode::CONFLICT,
            AppError::TooLate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CooldownActive(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ParcelNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({ "error": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_codes() {
        assert_eq!(AppError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(AppError::InvalidAction("x".into()).code(), "INVALID_ACTION");
        assert_eq!(AppError::TooLate("x".into()).code(), "TOO_LATE");
        assert_eq!(
            AppError::CooldownActive("x".into()).code(),
            "COOLDOWN_ACTIVE"
        );
        assert_eq!(
            AppError::ParcelNotFound("x".into()).code(),
            "PARCEL_NOT_FOUND"
        );
    }
}
