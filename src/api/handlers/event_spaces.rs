//! `/api/event-spaces` handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::AppState;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::types::ApiResponse;
use crate::auth::AuthUser;
use crate::models::{AppResult, EventSpace};
use crate::services::event_spaces::{self, CreateEventSpaceRequest, EventSpaceFilter};

pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<EventSpaceFilter>,
) -> AppResult<Json<ApiResponse<Vec<EventSpace>>>> {
    let spaces = event_spaces::search(&state.db, &filter).await?;
    Ok(Json(ApiResponse::success(spaces)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<EventSpace>>> {
    let space = event_spaces::get(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(space)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateEventSpaceRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<EventSpace>>)> {
    let space = event_spaces::create(&state.db, &user, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(space))))
}
