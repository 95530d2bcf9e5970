//! `/api/rides` handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::AppState;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::types::ApiResponse;
use crate::auth::AuthUser;
use crate::models::AppResult;
use crate::services::rides::{self, CreateRideRequest, RideFilter, RideListing};

pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<RideFilter>,
) -> AppResult<Json<ApiResponse<Vec<RideListing>>>> {
    let rides = rides::search(&state.db, &filter).await?;
    Ok(Json(ApiResponse::success(rides)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<RideListing>>> {
    let ride = rides::get_listing(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(ride)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateRideRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RideListing>>)> {
    let ride = rides::create(&state.db, &user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ride).with_message("Ride published")),
    ))
}
