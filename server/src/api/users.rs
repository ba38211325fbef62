//! Account routes

use super::{ApiJson, ApiPath, ApiResponse, ApiResult};
use crate::app::AppState;
use crate::database::{LoginInput, RegisterInput, UserProfile};
use crate::services::auth::{LoginResponse, RefreshResponse};
use axum::extract::State;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RefreshInput {
    pub refresh: String,
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> ApiResult<UserProfile> {
    let profile = state.auth.register(input).await?;
    Ok(ApiResponse::created("User registered successfully", profile))
}

/// Exchange credentials for an access/refresh token pair
pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> ApiResult<LoginResponse> {
    let response = state.auth.login(input).await?;
    Ok(ApiResponse::ok("User login successful", response))
}

/// Redeem the link sent after registration
pub async fn verify(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<()> {
    state.auth.verify(&token).await?;
    Ok(ApiResponse::message("valid token"))
}

pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RefreshInput>,
) -> ApiResult<RefreshResponse> {
    let response = state.auth.refresh(&input.refresh).await?;
    Ok(ApiResponse::ok("Token refreshed successfully", response))
}
