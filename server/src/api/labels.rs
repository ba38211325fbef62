//! Label routes

use super::{ApiJson, ApiPath, ApiResponse, ApiResult, CurrentUser};
use crate::app::AppState;
use crate::database::{Label, LabelInput};
use axum::extract::State;

pub async fn list_labels(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Vec<Label>> {
    let labels = state.labels.list_labels(user.id()).await?;
    Ok(ApiResponse::ok("Labels retrieved successfully", labels))
}

pub async fn create_label(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<LabelInput>,
) -> ApiResult<Label> {
    let label = state.labels.create_label(user.id(), input).await?;
    Ok(ApiResponse::created("Label created successfully", label))
}

pub async fn get_label(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Label> {
    let label = state.labels.get_label(id, user.id()).await?;
    Ok(ApiResponse::ok("Label retrieved successfully", label))
}

/// Partial update
pub async fn update_label(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<LabelInput>,
) -> ApiResult<Label> {
    let label = state.labels.update_label(id, user.id(), input).await?;
    Ok(ApiResponse::ok("Label updated successfully", label))
}

pub async fn delete_label(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<()> {
    state.labels.delete_label(id, user.id()).await?;
    Ok(ApiResponse::message("Label deleted successfully"))
}
