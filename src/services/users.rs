//! User accounts and role assignment

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::VerifiedIdentity;
use crate::db::begin_write;
use crate::models::{
    AppConfig, AppError, AppResult, ErrorCode, Page, PageRequest, Pagination, Role, User,
};
use crate::services::{trim_in_place, trim_opt, Normalize};
use crate::utils::locale::normalize_mz_phone;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "must be 2-100 characters"))]
    pub full_name: String,
    pub phone: Option<String>,
    /// Extra roles requested at signup. `client` is always granted.
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "must be 2-100 characters"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl Normalize for RegisterRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.full_name);
    }
}

impl Normalize for UpdateProfileRequest {
    fn trim_fields(&mut self) {
        trim_opt(&mut self.full_name);
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub user_id: String,
    pub roles: Vec<String>,
}

fn parse_roles(raw: &[String]) -> AppResult<Vec<Role>> {
    let mut roles = Vec::with_capacity(raw.len());
    for name in raw {
        let role = Role::parse(name)
            .ok_or_else(|| AppError::bad_request(format!("Unknown role: {}", name)))?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles.sort();
    Ok(roles)
}

fn parse_phone(raw: Option<&str>) -> AppResult<Option<String>> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => normalize_mz_phone(p)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("Invalid Mozambican phone number")),
    }
}

async fn load_roles(conn: &mut SqliteConnection, user_id: &str) -> AppResult<Vec<Role>> {
    let mut roles: Vec<Role> =
        sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    roles.sort();
    Ok(roles)
}

async fn write_roles(conn: &mut SqliteConnection, user_id: &str, roles: &[Role]) -> AppResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    for role in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn find_by_firebase_uid(db: &SqlitePool, uid: &str) -> AppResult<Option<User>> {
    let mut conn = db.acquire().await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE firebase_uid = ?")
        .bind(uid)
        .fetch_optional(&mut *conn)
        .await?;

    match user {
        Some(mut user) => {
            user.roles = load_roles(&mut *conn, &user.id).await?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

pub async fn get(db: &SqlitePool, id: &str) -> AppResult<User> {
    let mut conn = db.acquire().await?;

    let mut user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    user.roles = load_roles(&mut *conn, &user.id).await?;
    Ok(user)
}

pub async fn register(
    db: &SqlitePool,
    config: &AppConfig,
    identity: &VerifiedIdentity,
    req: RegisterRequest,
) -> AppResult<User> {
    let req = req.normalized()?;

    let email = identity
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::bad_request("Login has no email address"))?;

    let mut roles = parse_roles(&req.roles)?;
    if let Some(role) = roles.iter().find(|r| !r.self_assignable()) {
        return Err(AppError::forbidden(format!(
            "Role {} cannot be self-assigned",
            role.as_str()
        )));
    }
    if !roles.contains(&Role::Client) {
        roles.push(Role::Client);
    }
    if config.is_admin_email(&email) {
        roles.push(Role::Admin);
    }
    roles.sort();
    roles.dedup();

    let phone = parse_phone(req.phone.as_deref())?;

    let mut tx = begin_write(db).await?;

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE firebase_uid = ? OR email = ?")
            .bind(&identity.uid)
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
    if existing > 0 {
        return Err(AppError::conflict(
            ErrorCode::AuthAlreadyRegistered,
            "An account already exists for this login",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, firebase_uid, email, full_name, phone, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&identity.uid)
    .bind(&email)
    .bind(&req.full_name)
    .bind(&phone)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    write_roles(&mut *tx, &id, &roles).await?;
    tx.commit().await?;

    info!(user_id = %id, roles = ?roles, "user registered");
    get(db, &id).await
}

pub async fn update_profile(db: &SqlitePool, user: &User, req: UpdateProfileRequest) -> AppResult<User> {
    let req = req.normalized()?;

    let full_name = req
        .full_name
        .as_deref()
        .unwrap_or(&user.full_name)
        .to_string();
    let phone = match req.phone.as_deref() {
        Some(raw) => parse_phone(Some(raw))?,
        None => user.phone.clone(),
    };

    sqlx::query("UPDATE users SET full_name = ?, phone = ?, updated_at = ? WHERE id = ?")
        .bind(&full_name)
        .bind(&phone)
        .bind(Utc::now())
        .bind(&user.id)
        .execute(db)
        .await?;

    get(db, &user.id).await
}

/// Replace a user's roles (admin operation)
pub async fn set_roles(db: &SqlitePool, req: SetRolesRequest) -> AppResult<User> {
    let roles = parse_roles(&req.roles)?;
    if roles.is_empty() {
        return Err(AppError::bad_request("At least one role is required"));
    }

    let mut tx = begin_write(db).await?;

    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(&req.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found("User"));
    }

    write_roles(&mut *tx, &req.user_id, &roles).await?;
    sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(&req.user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = %req.user_id, roles = ?roles, "roles updated");
    get(db, &req.user_id).await
}

pub async fn list(db: &SqlitePool, page: PageRequest) -> AppResult<Page<User>> {
    let mut conn = db.acquire().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *conn)
        .await?;

    let mut items = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
    )
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&mut *conn)
    .await?;

    for user in items.iter_mut() {
        user.roles = load_roles(&mut *conn, &user.id).await?;
    }

    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}
