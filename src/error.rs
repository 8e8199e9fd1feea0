use std::collections::HashMap;
use thiserror::Error;

use crate::api::validators::field::FieldError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed")]
    FieldErrors(HashMap<String, String>),

    #[error("{}", .0.message)]
    FieldSchema(FieldError),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Delete blocked: {0}")]
    DependentsExist(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Too many requests")]
    TooManyRequests,
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        AppError::FieldSchema(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;
        use serde_json::json;

        let (status, body) = match &self {
            AppError::AuthFailed => (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() })),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, json!({ "error": self.to_string() })),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            AppError::FieldErrors(fields) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "fields": fields }),
            ),
            AppError::FieldSchema(err) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": err.message,
                    "code": err.code,
                    "field": err.field,
                    "index": err.index,
                }),
            ),
            AppError::Duplicate(_) => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            AppError::DependentsExist(_) => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            AppError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, json!({ "error": self.to_string() })),
            _ => {
                tracing::error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal server error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
