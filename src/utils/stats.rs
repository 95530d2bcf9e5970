//! Marketplace activity counters
//!
//! Process-local statistics for the admin dashboard: registrations, bookings
//! per vertical, cancellations, reviews and booked revenue. Counters are
//! atomics so handlers never contend on a lock for the hot path.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::ServiceType;
use crate::utils::locale::format_mzn;

/// Snapshot returned by `GET /api/stats`
#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsSnapshot {
    pub users_registered: u64,
    pub bookings_created: u64,
    pub bookings_by_service: HashMap<String, u64>,
    pub bookings_cancelled: u64,
    pub reviews_created: u64,
    /// Revenue of bookings created since start, in MZN
    pub revenue_booked: f64,
    pub revenue_booked_formatted: String,
    /// Unix timestamp when counting started
    pub period_start: u64,
    pub period_end: u64,
}

/// Main stats collector
pub struct MarketplaceStats {
    users_registered: AtomicU64,
    bookings_created: AtomicU64,
    bookings_cancelled: AtomicU64,
    reviews_created: AtomicU64,
    /// Revenue kept in centavos so it fits an atomic
    revenue_centavos: AtomicU64,
    bookings_by_service: RwLock<HashMap<ServiceType, u64>>,
    session_start: u64,
}

impl MarketplaceStats {
    pub fn new() -> Self {
        Self {
            users_registered: AtomicU64::new(0),
            bookings_created: AtomicU64::new(0),
            bookings_cancelled: AtomicU64::new(0),
            reviews_created: AtomicU64::new(0),
            revenue_centavos: AtomicU64::new(0),
            bookings_by_service: RwLock::new(HashMap::new()),
            session_start: current_timestamp(),
        }
    }

    pub fn record_registration(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_booking(&self, service: ServiceType, total_price: f64) {
        self.bookings_created.fetch_add(1, Ordering::Relaxed);
        let centavos = (total_price.max(0.0) * 100.0).round() as u64;
        self.revenue_centavos.fetch_add(centavos, Ordering::Relaxed);

        if let Ok(mut counts) = self.bookings_by_service.write() {
            *counts.entry(service).or_insert(0) += 1;
        }
    }

    pub fn record_cancellation(&self) {
        self.bookings_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_review(&self) {
        self.reviews_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let revenue = self.revenue_centavos.load(Ordering::Relaxed) as f64 / 100.0;

        let bookings_by_service = self
            .bookings_by_service
            .read()
            .map(|counts| {
                counts
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), *v))
                    .collect()
            })
            .unwrap_or_default();

        StatsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            bookings_created: self.bookings_created.load(Ordering::Relaxed),
            bookings_by_service,
            bookings_cancelled: self.bookings_cancelled.load(Ordering::Relaxed),
            reviews_created: self.reviews_created.load(Ordering::Relaxed),
            revenue_booked: revenue,
            revenue_booked_formatted: format_mzn(revenue),
            period_start: self.session_start,
            period_end: current_timestamp(),
        }
    }
}

impl Default for MarketplaceStats {
    fn default() -> Self {
        Self::new()
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
