//! HTTP API
//!
//! This module organizes the routes into logical submodules:
//! - `users`: Registration, login, verification and token refresh
//! - `notes`: Note CRUD, archive/trash, sharing and labels
//! - `labels`: Label CRUD
//! - `auth`: Bearer token extractor
//! - `middleware`: Access counting

pub mod auth;
pub mod labels;
pub mod middleware;
pub mod notes;
pub mod users;

use crate::app::AppState;
use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::CurrentUser;

/// JSON body whose rejections render as error envelopes
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections render as error envelopes
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Success envelope: `{message, status, data?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    code: StatusCode,
    message: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK,
            message: message.into(),
            status: "success",
            data: Some(data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    /// Replace the `status` word, e.g. for partial success
    pub fn with_status(mut self, status: &'static str) -> Self {
        self.status = status;
        self
    }
}

impl ApiResponse<()> {
    /// Envelope without a `data` member
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK,
            message: message.into(),
            status: "success",
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let code = self.code;
        (code, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

async fn health() -> ApiResponse<()> {
    ApiResponse::message("ok")
}

async fn fallback() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Users
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/verify/{token}", get(users::verify))
        .route("/token/refresh", post(users::refresh))
        // Notes
        .route("/notes/", get(notes::list_notes).post(notes::create_note))
        .route("/notes/archived-notes", get(notes::archived_notes))
        .route("/notes/trashed", get(notes::trashed_notes))
        .route("/notes/add-collaborators", post(notes::add_collaborators))
        .route("/notes/remove-collaborators", post(notes::remove_collaborators))
        .route("/notes/add-labels", post(notes::add_labels))
        .route("/notes/remove-labels", post(notes::remove_labels))
        .route(
            "/notes/{id}/",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route(
            "/notes/{id}/toggle-archive",
            put(notes::toggle_archive).patch(notes::toggle_archive),
        )
        .route(
            "/notes/{id}/toggle-trash",
            put(notes::toggle_trash).patch(notes::toggle_trash),
        )
        .route("/notes/{id}/change-color", put(notes::change_color))
        .route("/notes/{id}/edit-note", put(notes::edit_note))
        // Labels
        .route("/labels/", get(labels::list_labels).post(labels::create_label))
        .route(
            "/labels/{id}/",
            get(labels::get_label)
                .put(labels::update_label)
                .delete(labels::delete_label),
        )
        .fallback(fallback)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access_log,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
