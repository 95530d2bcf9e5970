//! Price quotes for stays, event days and ride seats

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::RatePlan;
use crate::utils::locale::format_mzn;

/// Breakdown shown before booking and stored as the booking total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_plan_name: Option<String>,
    pub nightly_rate: f64,
    pub nights: i64,
    pub units: i64,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub total_formatted: String,
    pub is_refundable: bool,
}

/// Round to centavos
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether a rate plan's discount applies to a stay of this length
pub fn plan_applies(plan: &RatePlan, nights: i64) -> bool {
    plan.is_active && nights >= plan.min_nights
}

/// Quote a stay. Without a rate plan the stay is priced at the base rate and
/// is refundable.
pub fn quote_stay(base_price: f64, nights: i64, units: i64, plan: Option<&RatePlan>) -> PriceQuote {
    let subtotal = round_money(base_price * nights as f64 * units as f64);

    let discount = match plan {
        Some(plan) if plan_applies(plan, nights) => {
            let percent = plan.discount_percent.clamp(0.0, 100.0);
            round_money(subtotal * percent / 100.0)
        }
        _ => 0.0,
    };

    let total = round_money(subtotal - discount);

    PriceQuote {
        rate_plan_id: plan.map(|p| p.id.clone()),
        rate_plan_name: plan.map(|p| p.name.clone()),
        nightly_rate: round_money(base_price),
        nights,
        units,
        subtotal,
        discount,
        total,
        total_formatted: format_mzn(total),
        is_refundable: plan.map(|p| p.is_refundable).unwrap_or(true),
    }
}

pub fn quote_event(price_per_day: f64, days: i64) -> f64 {
    round_money(price_per_day * days as f64)
}

pub fn quote_ride(price_per_seat: f64, seats: i64) -> f64 {
    round_money(price_per_seat * seats as f64)
}

/// Full refund when refundable and cancelled before the start date
pub fn refund_amount(total: f64, refundable: bool, today: NaiveDate, start: NaiveDate) -> f64 {
    if refundable && today < start {
        round_money(total)
    } else {
        0.0
    }
}
