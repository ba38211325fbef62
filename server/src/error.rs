//! Error types for the notes server
//!
//! All errors use thiserror for structured error handling.
//! Every variant maps to an HTTP status and is rendered with the same
//! `{message, status, errors}` envelope the success responses use.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name → human readable message
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} is required.")]
    MissingField(&'static str),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    #[error("Label not found: {0}")]
    LabelNotFound(i64),

    #[error("{0}")]
    NotFound(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Build a validation error for a single field
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), message.into());
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::MissingField(_)
            | AppError::InvalidCredentials
            | AppError::ExpiredToken
            | AppError::InvalidToken => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NoteNotFound(_) | AppError::LabelNotFound(_) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Scheduler(_)
            | AppError::Mail(_)
            | AppError::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to API clients. Server-side failures are summarised.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) => "Validation error".to_string(),
            AppError::NoteNotFound(_) => "Note not found".to_string(),
            AppError::LabelNotFound(_) => "Label not found".to_string(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Scheduler(_)
            | AppError::Mail(_)
            | AppError::Generic(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let mut body = json!({
            "message": self.public_message(),
            "status": "error",
        });

        match &self {
            AppError::Validation(errors) => body["errors"] = json!(errors),
            AppError::NoteNotFound(_) => body["errors"] = json!("The requested note does not exist."),
            AppError::LabelNotFound(_) => body["errors"] = json!("The requested label does not exist."),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for AppError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        AppError::Scheduler(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::InvalidToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::MissingField("color").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Unauthorized("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("nope".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NoteNotFound(3).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Generic("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_field_message() {
        assert_eq!(AppError::MissingField("color").to_string(), "color is required.");
    }

    #[test]
    fn test_server_errors_are_not_echoed() {
        let err = AppError::Generic("secret stack detail".into());
        assert_eq!(err.public_message(), "An unexpected error occurred");
    }
}
