//! `/api/auth` handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::AppState;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::types::{ApiResponse, PageQuery};
use crate::auth::{require_admin, AuthUser, Identity};
use crate::models::{AppResult, Page, PageRequest, User};
use crate::services::users::{self, RegisterRequest, SetRolesRequest, UpdateProfileRequest};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Identity(identity): Identity,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let user = users::register(&state.db, &state.config, &identity, req).await?;
    state.stats.record_registration();

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(user).with_message("Account created")),
    ))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<ApiResponse<User>> {
    Json(ApiResponse::success(user))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let updated = users::update_profile(&state.db, &user, req).await?;
    Ok(Json(ApiResponse::success(updated).with_message("Profile updated")))
}

pub async fn set_roles(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    ApiJson(req): ApiJson<SetRolesRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    require_admin(&admin)?;
    let updated = users::set_roles(&state.db, req).await?;
    Ok(Json(ApiResponse::success(updated).with_message("Roles updated")))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(admin): AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<ApiResponse<Page<User>>>> {
    require_admin(&admin)?;
    let page = users::list(&state.db, PageRequest::new(query.page, query.limit)).await?;
    Ok(Json(ApiResponse::success(page)))
}
