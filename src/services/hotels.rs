//! Hotels, room types and rate plans

use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{require_any_role, require_owner_or_admin};
use crate::db::like_contains;
use crate::models::{
    AppError, AppResult, Hotel, Page, PageRequest, Pagination, RatePlan, Role, RoomType, User,
};
use crate::services::{trim_in_place, trim_opt, Normalize};

#[derive(Debug, Default, Deserialize)]
pub struct HotelFilter {
    pub city: Option<String>,
    pub province: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub guests: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHotelRequest {
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 3, max = 250))]
    pub address: String,
    #[validate(length(min = 2, max = 100))]
    pub city: String,
    #[validate(length(min = 2, max = 100))]
    pub province: String,
    #[validate(range(min = 0, max = 5))]
    #[serde(default)]
    pub star_rating: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateHotelRequest {
    #[validate(length(min = 2, max = 150))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 3, max = 250))]
    pub address: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub province: Option<String>,
    #[validate(range(min = 0, max = 5))]
    pub star_rating: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomTypeRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 20))]
    pub capacity: i64,
    #[validate(range(exclusive_min = 0.0))]
    pub base_price: f64,
    #[validate(range(min = 1, max = 1000))]
    pub total_units: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRatePlanRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub discount_percent: f64,
    #[validate(range(min = 1, max = 30))]
    #[serde(default = "default_min_nights")]
    pub min_nights: i64,
    #[serde(default = "default_refundable")]
    pub is_refundable: bool,
}

impl Normalize for CreateHotelRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
        trim_opt(&mut self.description);
        trim_in_place(&mut self.address);
        trim_in_place(&mut self.city);
        trim_in_place(&mut self.province);
    }
}

impl Normalize for UpdateHotelRequest {
    fn trim_fields(&mut self) {
        trim_opt(&mut self.name);
        trim_opt(&mut self.description);
        trim_opt(&mut self.address);
        trim_opt(&mut self.city);
        trim_opt(&mut self.province);
    }
}

impl Normalize for CreateRoomTypeRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
        trim_opt(&mut self.description);
    }
}

impl Normalize for CreateRatePlanRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
    }
}

fn default_min_nights() -> i64 {
    1
}

fn default_refundable() -> bool {
    true
}

/// Shared WHERE clause for search and its count
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &HotelFilter) {
    qb.push(" WHERE h.is_active = 1");

    if let Some(city) = filter.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        qb.push(" AND LOWER(h.city) LIKE ")
            .push_bind(like_contains(city))
            .push(" ESCAPE '\\'");
    }
    if let Some(province) = filter.province.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        qb.push(" AND LOWER(h.province) LIKE ")
            .push_bind(like_contains(province))
            .push(" ESCAPE '\\'");
    }

    if filter.min_price.is_some() || filter.max_price.is_some() || filter.guests.is_some() {
        qb.push(" AND EXISTS (SELECT 1 FROM room_types rt WHERE rt.hotel_id = h.id AND rt.is_active = 1");
        if let Some(min) = filter.min_price {
            qb.push(" AND rt.base_price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND rt.base_price <= ").push_bind(max);
        }
        if let Some(guests) = filter.guests {
            qb.push(" AND rt.capacity >= ").push_bind(guests);
        }
        qb.push(")");
    }
}

pub async fn search(db: &SqlitePool, filter: &HotelFilter) -> AppResult<Page<Hotel>> {
    let page = PageRequest::new(filter.page, filter.limit);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM hotels h");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut query = QueryBuilder::<Sqlite>::new("SELECT h.* FROM hotels h");
    push_filters(&mut query, filter);
    query
        .push(" ORDER BY h.rating DESC, h.name ASC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let items = query.build_query_as::<Hotel>().fetch_all(db).await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}

/// Any hotel, active or not
pub async fn get(db: &SqlitePool, id: &str) -> AppResult<Hotel> {
    sqlx::query_as::<_, Hotel>("SELECT * FROM hotels WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Hotel"))
}

/// Hotel visible to the public
pub async fn get_active(db: &SqlitePool, id: &str) -> AppResult<Hotel> {
    let hotel = get(db, id).await?;
    if !hotel.is_active {
        return Err(AppError::not_found("Hotel"));
    }
    Ok(hotel)
}

/// Load a hotel and check the caller may manage it
async fn get_managed(db: &SqlitePool, user: &User, id: &str) -> AppResult<Hotel> {
    let hotel = get(db, id).await?;
    require_owner_or_admin(user, &hotel.manager_id)?;
    Ok(hotel)
}

pub async fn create(db: &SqlitePool, user: &User, req: CreateHotelRequest) -> AppResult<Hotel> {
    require_any_role(user, &[Role::HotelManager])?;
    let req = req.normalized()?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO hotels (id, manager_id, name, description, address, city, province,
                            star_rating, rating, review_count, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.address)
    .bind(&req.city)
    .bind(&req.province)
    .bind(req.star_rating)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    info!(hotel_id = %id, manager_id = %user.id, "hotel created");
    get(db, &id).await
}

pub async fn update(db: &SqlitePool, user: &User, id: &str, req: UpdateHotelRequest) -> AppResult<Hotel> {
    let req = req.normalized()?;
    let hotel = get_managed(db, user, id).await?;

    sqlx::query(
        r#"
        UPDATE hotels
        SET name = ?, description = ?, address = ?, city = ?, province = ?, star_rating = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.name.as_deref().unwrap_or(&hotel.name))
    .bind(req.description.or(hotel.description))
    .bind(req.address.as_deref().unwrap_or(&hotel.address))
    .bind(req.city.as_deref().unwrap_or(&hotel.city))
    .bind(req.province.as_deref().unwrap_or(&hotel.province))
    .bind(req.star_rating.unwrap_or(hotel.star_rating))
    .bind(Utc::now())
    .bind(id)
    .execute(db)
    .await?;

    get(db, id).await
}

/// Soft delete: bookings and reviews keep pointing at the row
pub async fn deactivate(db: &SqlitePool, user: &User, id: &str) -> AppResult<()> {
    get_managed(db, user, id).await?;

    sqlx::query("UPDATE hotels SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;

    info!(hotel_id = %id, "hotel deactivated");
    Ok(())
}

// ============================================
// Room types
// ============================================

pub async fn list_room_types(db: &SqlitePool, hotel_id: &str) -> AppResult<Vec<RoomType>> {
    get_active(db, hotel_id).await?;

    let rows = sqlx::query_as::<_, RoomType>(
        "SELECT * FROM room_types WHERE hotel_id = ? AND is_active = 1 ORDER BY base_price ASC, name ASC",
    )
    .bind(hotel_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get_room_type(db: &SqlitePool, id: &str) -> AppResult<RoomType> {
    sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Room type"))
}

pub async fn create_room_type(
    db: &SqlitePool,
    user: &User,
    hotel_id: &str,
    req: CreateRoomTypeRequest,
) -> AppResult<RoomType> {
    let req = req.normalized()?;
    get_managed(db, user, hotel_id).await?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO room_types (id, hotel_id, name, description, capacity, base_price, total_units, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(&id)
    .bind(hotel_id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.capacity)
    .bind(req.base_price)
    .bind(req.total_units)
    .bind(Utc::now())
    .execute(db)
    .await?;

    get_room_type(db, &id).await
}

// ============================================
// Rate plans
// ============================================

pub async fn list_rate_plans(db: &SqlitePool, hotel_id: &str) -> AppResult<Vec<RatePlan>> {
    get_active(db, hotel_id).await?;

    let rows = sqlx::query_as::<_, RatePlan>(
        "SELECT * FROM rate_plans WHERE hotel_id = ? AND is_active = 1 ORDER BY min_nights ASC, name ASC",
    )
    .bind(hotel_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get_rate_plan(db: &SqlitePool, id: &str) -> AppResult<RatePlan> {
    sqlx::query_as::<_, RatePlan>("SELECT * FROM rate_plans WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Rate plan"))
}

pub async fn create_rate_plan(
    db: &SqlitePool,
    user: &User,
    hotel_id: &str,
    req: CreateRatePlanRequest,
) -> AppResult<RatePlan> {
    let req = req.normalized()?;
    get_managed(db, user, hotel_id).await?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO rate_plans (id, hotel_id, name, discount_percent, min_nights, is_refundable, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(&id)
    .bind(hotel_id)
    .bind(&req.name)
    .bind(req.discount_percent)
    .bind(req.min_nights)
    .bind(req.is_refundable)
    .bind(Utc::now())
    .execute(db)
    .await?;

    get_rate_plan(db, &id).await
}
