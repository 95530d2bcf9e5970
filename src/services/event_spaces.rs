//! Event venues

use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_any_role;
use crate::db::like_contains;
use crate::models::{AppError, AppResult, EventSpace, Role, User};
use crate::services::{trim_in_place, trim_opt, Normalize};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventSpaceRequest {
    #[validate(length(min = 2, max = 150))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub city: String,
    #[validate(range(min = 1, max = 100000))]
    pub capacity: i64,
    #[validate(range(exclusive_min = 0.0))]
    pub price_per_day: f64,
}

impl Normalize for CreateEventSpaceRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.name);
        trim_opt(&mut self.description);
        trim_in_place(&mut self.city);
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventSpaceFilter {
    pub city: Option<String>,
    pub min_capacity: Option<i64>,
}

pub async fn get(db: &SqlitePool, id: &str) -> AppResult<EventSpace> {
    sqlx::query_as::<_, EventSpace>("SELECT * FROM event_spaces WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Event space"))
}

pub async fn create(db: &SqlitePool, user: &User, req: CreateEventSpaceRequest) -> AppResult<EventSpace> {
    require_any_role(user, &[Role::EventManager])?;
    let req = req.normalized()?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO event_spaces (id, manager_id, name, description, city, capacity, price_per_day, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.city)
    .bind(req.capacity)
    .bind(req.price_per_day)
    .bind(Utc::now())
    .execute(db)
    .await?;

    info!(event_space_id = %id, manager_id = %user.id, "event space created");
    get(db, &id).await
}

pub async fn search(db: &SqlitePool, filter: &EventSpaceFilter) -> AppResult<Vec<EventSpace>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM event_spaces WHERE is_active = 1");

    if let Some(city) = filter.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        qb.push(" AND LOWER(city) LIKE ")
            .push_bind(like_contains(city))
            .push(" ESCAPE '\\'");
    }
    if let Some(min) = filter.min_capacity {
        qb.push(" AND capacity >= ").push_bind(min);
    }
    qb.push(" ORDER BY price_per_day ASC, name ASC LIMIT 100");

    Ok(qb.build_query_as::<EventSpace>().fetch_all(db).await?)
}
