//! `/api/hotels` handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use chrono::Utc;
use std::sync::Arc;

use super::AppState;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::types::ApiResponse;
use crate::auth::AuthUser;
use crate::models::{AppResult, Hotel, Page, RatePlan, RoomType};
use crate::services::availability::{self, AvailabilityQuery, HotelAvailability};
use crate::services::hotels::{
    self, CreateHotelRequest, CreateRatePlanRequest, CreateRoomTypeRequest, HotelFilter, UpdateHotelRequest,
};

type Created<T> = AppResult<(StatusCode, Json<ApiResponse<T>>)>;

pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<HotelFilter>,
) -> AppResult<Json<ApiResponse<Page<Hotel>>>> {
    let page = hotels::search(&state.db, &filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<Hotel>>> {
    let hotel = hotels::get_active(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(hotel)))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateHotelRequest>,
) -> Created<Hotel> {
    let hotel = hotels::create(&state.db, &user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(hotel).with_message("Hotel created")),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateHotelRequest>,
) -> AppResult<Json<ApiResponse<Hotel>>> {
    let hotel = hotels::update(&state.db, &user, &id, req).await?;
    Ok(Json(ApiResponse::success(hotel).with_message("Hotel updated")))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    hotels::deactivate(&state.db, &user, &id).await?;
    Ok(Json(ApiResponse::message("Hotel deactivated")))
}

pub async fn list_room_types(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<Vec<RoomType>>>> {
    let rooms = hotels::list_room_types(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(rooms)))
}

pub async fn create_room_type(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<CreateRoomTypeRequest>,
) -> Created<RoomType> {
    let room = hotels::create_room_type(&state.db, &user, &id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(room))))
}

pub async fn list_rate_plans(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<Vec<RatePlan>>>> {
    let plans = hotels::list_rate_plans(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(plans)))
}

pub async fn create_rate_plan(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<CreateRatePlanRequest>,
) -> Created<RatePlan> {
    let plan = hotels::create_rate_plan(&state.db, &user, &id, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(plan))))
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> AppResult<Json<ApiResponse<HotelAvailability>>> {
    let today = Utc::now().date_naive();
    let result = availability::hotel_availability(&state.db, &id, &query, today).await?;
    Ok(Json(ApiResponse::success(result)))
}
