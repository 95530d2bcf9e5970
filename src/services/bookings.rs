//! Bookings across the three verticals
//!
//! Every create runs inside one transaction so the availability check and the
//! insert see the same inventory.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_owner_or_admin;
use crate::core::availability::{available_units, event_days, validate_stay};
use crate::core::pricing::{quote_event, quote_ride, quote_stay, refund_amount, round_money};
use crate::db::begin_write;
use crate::models::{
    AppError, AppResult, Booking, BookingStatus, ErrorCode, EventSpace, Page, PageRequest,
    Pagination, RatePlan, Ride, RideStatus, RoomType, ServiceType, User,
};
use crate::services::availability::holds_for_room_type;
use crate::services::rides::seats_taken;
use crate::utils::locale::{format_date_range, format_mzn};

// ============================================
// Requests
// ============================================

#[derive(Debug, Deserialize, Validate)]
pub struct HotelBookingRequest {
    pub room_type_id: String,
    pub rate_plan_id: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_one")]
    pub rooms: i64,
    #[validate(range(min = 1, max = 200))]
    pub guests: i64,
    #[validate(length(max = 500))]
    pub special_requests: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RideBookingRequest {
    pub ride_id: String,
    #[validate(range(min = 1, max = 8))]
    #[serde(default = "default_one")]
    pub seats: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventBookingRequest {
    pub event_space_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1))]
    pub guests: i64,
    #[validate(length(max = 500))]
    pub special_requests: Option<String>,
}

/// `{"service_type": "hotel" | "ride" | "event", ...}`
#[derive(Debug, Deserialize)]
#[serde(tag = "service_type", rename_all = "snake_case")]
pub enum CreateBookingRequest {
    Hotel(HotelBookingRequest),
    Ride(RideBookingRequest),
    Event(EventBookingRequest),
}

fn default_one() -> i64 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

// ============================================
// Responses
// ============================================

#[derive(Debug, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub total_price_formatted: String,
    pub dates_label: String,
}

impl From<Booking> for BookingView {
    fn from(booking: Booking) -> Self {
        Self {
            total_price_formatted: format_mzn(booking.total_price),
            dates_label: format_date_range(booking.start_date, booking.end_date),
            booking,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelOutcome {
    pub booking: BookingView,
    pub refund_amount: f64,
    pub refund_formatted: String,
}

// ============================================
// Loading
// ============================================

async fn load(conn: &mut SqliteConnection, id: &str) -> AppResult<Booking> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))
}

/// User who provides the booked service: hotel manager, driver or venue manager
async fn provider_id(conn: &mut SqliteConnection, booking: &Booking) -> AppResult<String> {
    let (sql, id) = match booking.service_type {
        ServiceType::Hotel => ("SELECT manager_id FROM hotels WHERE id = ?", &booking.hotel_id),
        ServiceType::Ride => ("SELECT driver_id FROM rides WHERE id = ?", &booking.ride_id),
        ServiceType::Event => ("SELECT manager_id FROM event_spaces WHERE id = ?", &booking.event_space_id),
    };
    let id = id
        .as_deref()
        .ok_or_else(|| AppError::internal("Booking has no service reference"))?;

    sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Service"))
}

async fn insert(conn: &mut SqliteConnection, booking: &Booking) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (id, user_id, service_type, hotel_id, room_type_id, rate_plan_id, ride_id,
                              event_space_id, start_date, end_date, units, guests, total_price, status,
                              special_requests, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.user_id)
    .bind(booking.service_type)
    .bind(&booking.hotel_id)
    .bind(&booking.room_type_id)
    .bind(&booking.rate_plan_id)
    .bind(&booking.ride_id)
    .bind(&booking.event_space_id)
    .bind(booking.start_date)
    .bind(booking.end_date)
    .bind(booking.units)
    .bind(booking.guests)
    .bind(booking.total_price)
    .bind(booking.status)
    .bind(&booking.special_requests)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn new_booking(user: &User, service_type: ServiceType, start: NaiveDate, end: NaiveDate) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        service_type,
        hotel_id: None,
        room_type_id: None,
        rate_plan_id: None,
        ride_id: None,
        event_space_id: None,
        start_date: start,
        end_date: end,
        units: 1,
        guests: 1,
        total_price: 0.0,
        status: BookingStatus::Pending,
        special_requests: None,
        created_at: now,
        updated_at: now,
    }
}

fn clean_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ============================================
// Create
// ============================================

/// A booking that lost the race for the write lock reads as sold out
fn busy_as_unavailable(err: AppError) -> AppError {
    if err.code == ErrorCode::DbBusy {
        AppError::unavailable("Too many bookings at once for this service, try again")
    } else {
        err
    }
}

pub async fn create(db: &SqlitePool, user: &User, req: CreateBookingRequest) -> AppResult<BookingView> {
    let today = Utc::now().date_naive();
    let mut tx = begin_write(db).await.map_err(busy_as_unavailable)?;

    let booking = match req {
        CreateBookingRequest::Hotel(req) => book_hotel(&mut *tx, user, req, today).await?,
        CreateBookingRequest::Ride(req) => book_ride(&mut *tx, user, req).await?,
        CreateBookingRequest::Event(req) => book_event(&mut *tx, user, req, today).await?,
    };

    insert(&mut *tx, &booking).await?;
    tx.commit().await.map_err(|e| busy_as_unavailable(e.into()))?;

    info!(
        booking_id = %booking.id,
        user_id = %user.id,
        service = booking.service_type.as_str(),
        total = booking.total_price,
        "booking created"
    );
    Ok(booking.into())
}

async fn book_hotel(
    conn: &mut SqliteConnection,
    user: &User,
    req: HotelBookingRequest,
    today: NaiveDate,
) -> AppResult<Booking> {
    req.validate()?;
    let nights = validate_stay(req.check_in, req.check_out, today)?.len() as i64;

    let room_type = sqlx::query_as::<_, RoomType>(
        r#"
        SELECT rt.* FROM room_types rt
        JOIN hotels h ON h.id = rt.hotel_id
        WHERE rt.id = ? AND rt.is_active = 1 AND h.is_active = 1
        "#,
    )
    .bind(&req.room_type_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Room type"))?;

    if req.guests > room_type.capacity * req.rooms {
        return Err(AppError::bad_request(format!(
            "{} room(s) of this type hold at most {} guests",
            req.rooms,
            room_type.capacity * req.rooms
        )));
    }

    let plan = match req.rate_plan_id.as_deref() {
        Some(plan_id) => {
            let plan = sqlx::query_as::<_, RatePlan>("SELECT * FROM rate_plans WHERE id = ?")
                .bind(plan_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| AppError::not_found("Rate plan"))?;
            if plan.hotel_id != room_type.hotel_id || !plan.is_active {
                return Err(AppError::bad_request("Rate plan is not offered by this hotel"));
            }
            Some(plan)
        }
        None => None,
    };

    let holds = holds_for_room_type(conn, &room_type.id, req.check_in, req.check_out).await?;
    let free = available_units(room_type.total_units, &holds, req.check_in, req.check_out)?;
    if free < req.rooms {
        return Err(AppError::unavailable(format!(
            "Only {} room(s) left for these dates",
            free
        )));
    }

    let quote = quote_stay(room_type.base_price, nights, req.rooms, plan.as_ref());

    let mut booking = new_booking(user, ServiceType::Hotel, req.check_in, req.check_out);
    booking.hotel_id = Some(room_type.hotel_id);
    booking.room_type_id = Some(room_type.id);
    booking.rate_plan_id = plan.map(|p| p.id);
    booking.units = req.rooms;
    booking.guests = req.guests;
    booking.total_price = quote.total;
    booking.status = BookingStatus::Confirmed;
    booking.special_requests = clean_text(req.special_requests);
    Ok(booking)
}

async fn book_ride(conn: &mut SqliteConnection, user: &User, req: RideBookingRequest) -> AppResult<Booking> {
    req.validate()?;

    let ride = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = ?")
        .bind(&req.ride_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Ride"))?;

    if ride.status != RideStatus::Scheduled || ride.departure_at <= Utc::now() {
        return Err(AppError::invalid_state("Ride is no longer open for booking"));
    }
    if ride.driver_id == user.id {
        return Err(AppError::bad_request("Drivers cannot book their own ride"));
    }

    let free = ride.total_seats - seats_taken(conn, &ride.id).await?;
    if req.seats > free {
        return Err(AppError::unavailable(format!(
            "Only {} seat(s) left on this ride",
            free.max(0)
        )));
    }

    let day = ride.departure_at.date_naive();
    let mut booking = new_booking(user, ServiceType::Ride, day, day);
    booking.ride_id = Some(ride.id);
    booking.units = req.seats;
    booking.guests = req.seats;
    booking.total_price = quote_ride(ride.price_per_seat, req.seats);
    booking.status = BookingStatus::Confirmed;
    Ok(booking)
}

async fn book_event(
    conn: &mut SqliteConnection,
    user: &User,
    req: EventBookingRequest,
    today: NaiveDate,
) -> AppResult<Booking> {
    req.validate()?;
    if req.start_date < today {
        return Err(AppError::bad_request("Start date is in the past"));
    }
    let days = event_days(req.start_date, req.end_date)?;

    let space = sqlx::query_as::<_, EventSpace>("SELECT * FROM event_spaces WHERE id = ? AND is_active = 1")
        .bind(&req.event_space_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Event space"))?;

    if req.guests > space.capacity {
        return Err(AppError::bad_request(format!(
            "This space holds at most {} guests",
            space.capacity
        )));
    }

    // inclusive day ranges
    let clashes: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM bookings
        WHERE event_space_id = ?
          AND status IN ('pending', 'confirmed')
          AND start_date <= ?
          AND end_date >= ?
        "#,
    )
    .bind(&space.id)
    .bind(req.end_date)
    .bind(req.start_date)
    .fetch_one(&mut *conn)
    .await?;
    if clashes > 0 {
        return Err(AppError::unavailable("The space is already booked on some of these days"));
    }

    let mut booking = new_booking(user, ServiceType::Event, req.start_date, req.end_date);
    booking.total_price = quote_event(space.price_per_day, days);
    booking.event_space_id = Some(space.id);
    booking.guests = req.guests;
    booking.special_requests = clean_text(req.special_requests);
    Ok(booking)
}

// ============================================
// Read
// ============================================

/// Visible to the guest, the service provider and admins
pub async fn get(db: &SqlitePool, user: &User, id: &str) -> AppResult<BookingView> {
    let mut conn = db.acquire().await?;
    let booking = load(&mut *conn, id).await?;

    if booking.user_id != user.id && !user.is_admin() {
        let provider = provider_id(&mut *conn, &booking).await?;
        if provider != user.id {
            // do not leak existence
            return Err(AppError::not_found("Booking"));
        }
    }

    Ok(booking.into())
}

fn push_owner_filter(qb: &mut QueryBuilder<'_, Sqlite>, user_id: &str, status: Option<BookingStatus>) {
    qb.push(" WHERE user_id = ").push_bind(user_id.to_string());
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
}

pub async fn list_for_user(db: &SqlitePool, user: &User, filter: &BookingFilter) -> AppResult<Page<BookingView>> {
    let page = PageRequest::new(filter.page, filter.limit);
    let status = match filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::bad_request(format!("Unknown booking status: {}", raw)))?,
        ),
        None => None,
    };

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM bookings");
    push_owner_filter(&mut count, &user.id, status);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM bookings");
    push_owner_filter(&mut query, &user.id, status);
    query
        .push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = query.build_query_as::<Booking>().fetch_all(db).await?;

    Ok(Page {
        items: rows.into_iter().map(BookingView::from).collect(),
        pagination: Pagination::new(page, total),
    })
}

// ============================================
// Status changes
// ============================================

async fn set_status(conn: &mut SqliteConnection, id: &str, status: BookingStatus) -> AppResult<()> {
    sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Cancel a booking and report the refund owed
pub async fn cancel(db: &SqlitePool, user: &User, id: &str) -> AppResult<CancelOutcome> {
    let today = Utc::now().date_naive();
    let mut tx = begin_write(db).await?;

    let booking = load(&mut *tx, id).await?;
    require_owner_or_admin(user, &booking.user_id)?;

    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(AppError::invalid_state(format!(
            "A {} booking cannot be cancelled",
            booking.status.as_str()
        )));
    }

    let refund = match booking.service_type {
        ServiceType::Ride => {
            let ride_id = booking.ride_id.as_deref().unwrap_or_default();
            let departure: Option<chrono::DateTime<Utc>> =
                sqlx::query_scalar("SELECT departure_at FROM rides WHERE id = ?")
                    .bind(ride_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match departure {
                Some(at) if at > Utc::now() => round_money(booking.total_price),
                _ => return Err(AppError::invalid_state("The ride has already departed")),
            }
        }
        ServiceType::Hotel | ServiceType::Event => {
            if today >= booking.start_date {
                return Err(AppError::invalid_state("Bookings can only be cancelled before the start date"));
            }
            let refundable = match booking.rate_plan_id.as_deref() {
                Some(plan_id) => sqlx::query_scalar::<_, bool>("SELECT is_refundable FROM rate_plans WHERE id = ?")
                    .bind(plan_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .unwrap_or(true),
                None => true,
            };
            refund_amount(booking.total_price, refundable, today, booking.start_date)
        }
    };

    set_status(&mut *tx, id, BookingStatus::Cancelled).await?;
    let booking = load(&mut *tx, id).await?;
    tx.commit().await?;

    info!(booking_id = %id, by = %user.id, refund, "booking cancelled");
    Ok(CancelOutcome {
        booking: booking.into(),
        refund_amount: refund,
        refund_formatted: format_mzn(refund),
    })
}

/// Provider accepts a pending booking
pub async fn confirm(db: &SqlitePool, user: &User, id: &str) -> AppResult<BookingView> {
    let mut tx = begin_write(db).await?;

    let booking = load(&mut *tx, id).await?;
    let provider = provider_id(&mut *tx, &booking).await?;
    if provider != user.id && !user.is_admin() {
        return Err(AppError::forbidden("Only the service provider can confirm this booking"));
    }
    if !(booking.status == BookingStatus::Pending && booking.status.can_transition_to(BookingStatus::Confirmed)) {
        return Err(AppError::invalid_state(format!(
            "A {} booking cannot be confirmed",
            booking.status.as_str()
        )));
    }

    set_status(&mut *tx, id, BookingStatus::Confirmed).await?;
    let booking = load(&mut *tx, id).await?;
    tx.commit().await?;

    info!(booking_id = %id, by = %user.id, "booking confirmed");
    Ok(booking.into())
}
