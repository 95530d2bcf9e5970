//! Hotel availability search

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::core::availability::{available_units, validate_stay, Hold};
use crate::core::pricing::{quote_stay, PriceQuote};
use crate::models::{AppError, AppResult, RatePlan, RoomType};
use crate::services::hotels;
use crate::utils::locale::{format_date_range, nights_label};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "default_one")]
    pub guests: i64,
    #[serde(default = "default_one")]
    pub rooms: i64,
}

fn default_one() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct RoomTypeAvailability {
    pub room_type: RoomType,
    pub available_units: i64,
    /// Base price first, then one quote per active rate plan
    pub quotes: Vec<PriceQuote>,
}

#[derive(Debug, Serialize)]
pub struct HotelAvailability {
    pub hotel_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub nights_label: String,
    pub dates_label: String,
    pub guests: i64,
    pub rooms: i64,
    pub room_types: Vec<RoomTypeAvailability>,
}

/// Units of a room type held by active bookings overlapping the stay
pub(crate) async fn holds_for_room_type(
    conn: &mut SqliteConnection,
    room_type_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> AppResult<Vec<Hold>> {
    let rows: Vec<(NaiveDate, NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT start_date, end_date, units FROM bookings
        WHERE room_type_id = ?
          AND service_type = 'hotel'
          AND status IN ('pending', 'confirmed')
          AND start_date < ?
          AND end_date > ?
        "#,
    )
    .bind(room_type_id)
    .bind(check_out)
    .bind(check_in)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(start, end, units)| Hold { start, end, units })
        .collect())
}

pub async fn hotel_availability(
    db: &SqlitePool,
    hotel_id: &str,
    query: &AvailabilityQuery,
    today: NaiveDate,
) -> AppResult<HotelAvailability> {
    if query.guests < 1 || query.rooms < 1 {
        return Err(AppError::bad_request("guests and rooms must be at least 1"));
    }
    let nights = validate_stay(query.check_in, query.check_out, today)?.len() as i64;

    hotels::get_active(db, hotel_id).await?;

    let mut conn = db.acquire().await?;

    let room_types = sqlx::query_as::<_, RoomType>(
        r#"
        SELECT * FROM room_types
        WHERE hotel_id = ? AND is_active = 1 AND capacity * ? >= ?
        ORDER BY base_price ASC, name ASC
        "#,
    )
    .bind(hotel_id)
    .bind(query.rooms)
    .bind(query.guests)
    .fetch_all(&mut *conn)
    .await?;

    let plans = sqlx::query_as::<_, RatePlan>(
        "SELECT * FROM rate_plans WHERE hotel_id = ? AND is_active = 1 ORDER BY min_nights ASC, name ASC",
    )
    .bind(hotel_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut result = Vec::with_capacity(room_types.len());
    for room_type in room_types {
        let holds = holds_for_room_type(&mut *conn, &room_type.id, query.check_in, query.check_out).await?;
        let free = available_units(room_type.total_units, &holds, query.check_in, query.check_out)?;

        let mut quotes = vec![quote_stay(room_type.base_price, nights, query.rooms, None)];
        quotes.extend(
            plans
                .iter()
                .map(|plan| quote_stay(room_type.base_price, nights, query.rooms, Some(plan))),
        );

        result.push(RoomTypeAvailability {
            room_type,
            available_units: free,
            quotes,
        });
    }

    Ok(HotelAvailability {
        hotel_id: hotel_id.to_string(),
        check_in: query.check_in,
        check_out: query.check_out,
        nights,
        nights_label: nights_label(nights),
        dates_label: format_date_range(query.check_in, query.check_out),
        guests: query.guests,
        rooms: query.rooms,
        room_types: result,
    })
}
