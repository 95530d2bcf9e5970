//! `/api/bookings` handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::AppState;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::types::ApiResponse;
use crate::auth::AuthUser;
use crate::models::{AppResult, Page};
use crate::services::bookings::{self, BookingFilter, BookingView, CancelOutcome, CreateBookingRequest};

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<BookingView>>)> {
    let view = bookings::create(&state.db, &user, req).await?;
    state
        .stats
        .record_booking(view.booking.service_type, view.booking.total_price);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(view).with_message("Booking created")),
    ))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiQuery(filter): ApiQuery<BookingFilter>,
) -> AppResult<Json<ApiResponse<Page<BookingView>>>> {
    let page = bookings::list_for_user(&state.db, &user, &filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<BookingView>>> {
    let view = bookings::get(&state.db, &user, &id).await?;
    Ok(Json(ApiResponse::success(view)))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<CancelOutcome>>> {
    let outcome = bookings::cancel(&state.db, &user, &id).await?;
    state.stats.record_cancellation();
    Ok(Json(ApiResponse::success(outcome).with_message("Booking cancelled")))
}

pub async fn confirm(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ApiResponse<BookingView>>> {
    let view = bookings::confirm(&state.db, &user, &id).await?;
    Ok(Json(ApiResponse::success(view).with_message("Booking confirmed")))
}
