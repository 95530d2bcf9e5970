//! Room-type inventory across date ranges
//!
//! Stays are half-open `[check_in, check_out)`: the checkout day is free for
//! the next guest. Event-space bookings use inclusive day ranges instead, see
//! [`days_overlap`].

use chrono::{Duration, NaiveDate};

use crate::models::{AppError, AppResult};

/// Longest stay accepted in one booking
pub const MAX_STAY_NIGHTS: i64 = 30;

/// Longest event-space booking in days
pub const MAX_EVENT_DAYS: i64 = 14;

/// Units held by one active booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hold {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub units: i64,
}

/// Every night of the stay, `[check_in, check_out)`
pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<Vec<NaiveDate>> {
    let count = (check_out - check_in).num_days();
    if count <= 0 {
        return Err(AppError::bad_request("Check-out must be after check-in"));
    }
    if count > MAX_STAY_NIGHTS {
        return Err(AppError::bad_request(format!(
            "Stays are limited to {} nights",
            MAX_STAY_NIGHTS
        )));
    }

    Ok((0..count).map(|i| check_in + Duration::days(i)).collect())
}

/// Reject stays that start in the past, then expand the nights
pub fn validate_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> AppResult<Vec<NaiveDate>> {
    if check_in < today {
        return Err(AppError::bad_request("Check-in date is in the past"));
    }
    nights(check_in, check_out)
}

/// Half-open overlap
pub fn ranges_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start < b_end && b_start < a_end
}

/// Inclusive overlap, used for event days
pub fn days_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Number of days in an inclusive event range
pub fn event_days(start: NaiveDate, end: NaiveDate) -> AppResult<i64> {
    let days = (end - start).num_days() + 1;
    if days <= 0 {
        return Err(AppError::bad_request("End date must not be before start date"));
    }
    if days > MAX_EVENT_DAYS {
        return Err(AppError::bad_request(format!(
            "Event bookings are limited to {} days",
            MAX_EVENT_DAYS
        )));
    }
    Ok(days)
}

/// Units held on each night of the stay
pub fn units_held_per_night(holds: &[Hold], nights: &[NaiveDate]) -> Vec<i64> {
    nights
        .iter()
        .map(|night| {
            holds
                .iter()
                .filter(|h| h.start <= *night && *night < h.end)
                .map(|h| h.units)
                .sum()
        })
        .collect()
}

/// Units still free for the whole stay: total minus the busiest night
pub fn available_units(
    total_units: i64,
    holds: &[Hold],
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> AppResult<i64> {
    let nights = nights(check_in, check_out)?;
    let peak = units_held_per_night(holds, &nights)
        .into_iter()
        .max()
        .unwrap_or(0);

    Ok((total_units - peak).max(0))
}
