//! Shared rides offered by drivers

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_any_role;
use crate::db::like_contains;
use crate::models::{AppError, AppResult, Ride, RideStatus, Role, User};
use crate::services::{trim_in_place, trim_opt, Normalize};
use crate::utils::locale::{format_datetime, format_mzn};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRideRequest {
    #[validate(length(min = 2, max = 120))]
    pub origin: String,
    #[validate(length(min = 2, max = 120))]
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    #[validate(range(min = 1, max = 8))]
    pub total_seats: i64,
    #[validate(range(exclusive_min = 0.0))]
    pub price_per_seat: f64,
    #[validate(length(max = 120))]
    pub vehicle: Option<String>,
}

impl Normalize for CreateRideRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.origin);
        trim_in_place(&mut self.destination);
        trim_opt(&mut self.vehicle);
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RideFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Ride as listed to passengers
#[derive(Debug, Serialize)]
pub struct RideListing {
    #[serde(flatten)]
    pub ride: Ride,
    pub seats_available: i64,
    pub price_per_seat_formatted: String,
    pub departure_formatted: String,
}

/// Seats held by pending or confirmed bookings
pub(crate) async fn seats_taken(conn: &mut SqliteConnection, ride_id: &str) -> AppResult<i64> {
    let taken: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(units), 0) FROM bookings
        WHERE ride_id = ? AND status IN ('pending', 'confirmed')
        "#,
    )
    .bind(ride_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(taken)
}

pub async fn seats_available(db: &SqlitePool, ride: &Ride) -> AppResult<i64> {
    let mut conn = db.acquire().await?;
    let taken = seats_taken(&mut *conn, &ride.id).await?;
    Ok((ride.total_seats - taken).max(0))
}

async fn listing(conn: &mut SqliteConnection, ride: Ride) -> AppResult<RideListing> {
    let taken = seats_taken(conn, &ride.id).await?;
    Ok(RideListing {
        seats_available: (ride.total_seats - taken).max(0),
        price_per_seat_formatted: format_mzn(ride.price_per_seat),
        departure_formatted: format_datetime(ride.departure_at),
        ride,
    })
}

pub async fn get(db: &SqlitePool, id: &str) -> AppResult<Ride> {
    sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Ride"))
}

pub async fn get_listing(db: &SqlitePool, id: &str) -> AppResult<RideListing> {
    let ride = get(db, id).await?;
    let mut conn = db.acquire().await?;
    listing(&mut *conn, ride).await
}

pub async fn create(db: &SqlitePool, user: &User, req: CreateRideRequest) -> AppResult<RideListing> {
    require_any_role(user, &[Role::Driver])?;
    let req = req.normalized()?;

    if req.departure_at <= Utc::now() {
        return Err(AppError::bad_request("Departure must be in the future"));
    }
    if req.origin.eq_ignore_ascii_case(&req.destination) {
        return Err(AppError::bad_request("Origin and destination must differ"));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO rides (id, driver_id, origin, destination, departure_at, total_seats,
                           price_per_seat, vehicle, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.origin)
    .bind(&req.destination)
    .bind(req.departure_at)
    .bind(req.total_seats)
    .bind(req.price_per_seat)
    .bind(&req.vehicle)
    .bind(RideStatus::Scheduled)
    .bind(Utc::now())
    .execute(db)
    .await?;

    info!(ride_id = %id, driver_id = %user.id, "ride offered");
    get_listing(db, &id).await
}

/// Scheduled rides that have not left yet, soonest first
pub async fn search(db: &SqlitePool, filter: &RideFilter) -> AppResult<Vec<RideListing>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM rides WHERE status = ");
    qb.push_bind(RideStatus::Scheduled)
        .push(" AND departure_at > ")
        .push_bind(Utc::now());

    if let Some(origin) = filter.origin.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
        qb.push(" AND LOWER(origin) LIKE ")
            .push_bind(like_contains(origin))
            .push(" ESCAPE '\\'");
    }
    if let Some(destination) = filter.destination.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        qb.push(" AND LOWER(destination) LIKE ")
            .push_bind(like_contains(destination))
            .push(" ESCAPE '\\'");
    }
    if let Some(date) = filter.date {
        let from = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        if let Some(from) = from {
            qb.push(" AND departure_at >= ")
                .push_bind(from)
                .push(" AND departure_at < ")
                .push_bind(from + Duration::days(1));
        }
    }
    qb.push(" ORDER BY departure_at ASC LIMIT 100");

    let mut conn = db.acquire().await?;
    let rides = qb.build_query_as::<Ride>().fetch_all(&mut *conn).await?;

    let mut listings = Vec::with_capacity(rides.len());
    for ride in rides {
        listings.push(listing(&mut *conn, ride).await?);
    }
    Ok(listings)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use crate::services::hotels::tests::insert_user;

    pub(crate) fn ride_request(origin: &str, destination: &str, hours_ahead: i64) -> CreateRideRequest {
        CreateRideRequest {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_at: Utc::now() + Duration::hours(hours_ahead),
            total_seats: 4,
            price_per_seat: 450.0,
            vehicle: Some("Toyota Corolla".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_requires_driver() {
        let pool = db::connect_in_memory().await.unwrap();
        let client = insert_user(&pool, "c1", &[Role::Client]).await;

        let err = create(&pool, &client, ride_request("Maputo", "Xai-Xai", 24)).await.unwrap_err();
        assert_eq!(err.code_str(), "AUTH_FORBIDDEN");
    }

    #[tokio::test]
    async fn test_rejects_past_departure() {
        let pool = db::connect_in_memory().await.unwrap();
        let driver = insert_user(&pool, "d1", &[Role::Driver]).await;

        let err = create(&pool, &driver, ride_request("Maputo", "Xai-Xai", -2)).await.unwrap_err();
        assert_eq!(err.code_str(), "API_BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_search_by_route() {
        let pool = db::connect_in_memory().await.unwrap();
        let driver = insert_user(&pool, "d1", &[Role::Driver]).await;

        let xai = create(&pool, &driver, ride_request("Maputo", "Xai-Xai", 48)).await.unwrap();
        create(&pool, &driver, ride_request("Beira", "Chimoio", 24)).await.unwrap();

        let all = search(&pool, &RideFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].ride.origin, "Beira");

        let found = search(
            &pool,
            &RideFilter {
                destination: Some("xai".to_string()),
                ..RideFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ride.id, xai.ride.id);
        assert_eq!(found[0].seats_available, 4);
        assert_eq!(found[0].price_per_seat_formatted, "450,00 MT");
    }
}
