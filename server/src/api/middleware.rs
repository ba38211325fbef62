//! Request middleware

use crate::app::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Count every request per (method, path) before handling it.
///
/// A failed write is logged and the request proceeds.
pub async fn access_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    if let Err(e) = state.repo.record_access(&method, &path).await {
        tracing::warn!("Failed to record access to {} {}: {}", method, path, e);
    }

    next.run(request).await
}
