//! `/api/reviews` handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::AppState;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::types::ApiResponse;
use crate::auth::AuthUser;
use crate::models::{AppResult, Page, ReviewWithAuthor};
use crate::services::reviews::{
    self, CreateReviewRequest, RespondRequest, ReviewListQuery, ReviewStats, UpdateReviewRequest,
};

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(hotel_id): ApiPath<String>,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewWithAuthor>>)> {
    let review = reviews::create(&state.db, &user, &hotel_id, req).await?;
    state.stats.record_review();

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(review).with_message("Review submitted")),
    ))
}

pub async fn list_for_hotel(
    State(state): State<Arc<AppState>>,
    ApiPath(hotel_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<ReviewListQuery>,
) -> AppResult<Json<ApiResponse<Page<ReviewWithAuthor>>>> {
    let page = reviews::list_for_hotel(&state.db, &hotel_id, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn stats_for_hotel(
    State(state): State<Arc<AppState>>,
    ApiPath(hotel_id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<ReviewStats>>> {
    let stats = reviews::stats_for_hotel(&state.db, &hotel_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewWithAuthor>>> {
    let review = reviews::update(&state.db, &user, &id, req).await?;
    Ok(Json(ApiResponse::success(review).with_message("Review updated")))
}

pub async fn mark_helpful(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<ReviewWithAuthor>>> {
    let review = reviews::mark_helpful(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(review)))
}

pub async fn respond(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<RespondRequest>,
) -> AppResult<Json<ApiResponse<ReviewWithAuthor>>> {
    let review = reviews::respond(&state.db, &user, &id, req).await?;
    Ok(Json(ApiResponse::success(review).with_message("Response published")))
}
