//! Domain entities shared by services, handlers and the database layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================
// Users & Roles
// ============================================

/// Marketplace role. A user holds one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Client,
    Driver,
    HotelManager,
    EventManager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Client,
        Role::Driver,
        Role::HotelManager,
        Role::EventManager,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Driver => "driver",
            Role::HotelManager => "hotel_manager",
            Role::EventManager => "event_manager",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Roles a user may pick for themselves at registration
    pub fn self_assignable(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing)]
    pub firebase_uid: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

// ============================================
// Hotels
// ============================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Hotel {
    pub id: String,
    pub manager_id: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub province: String,
    pub star_rating: i64,
    /// Average review rating, 0 when there are no reviews
    pub rating: f64,
    pub review_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoomType {
    pub id: String,
    pub hotel_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Guests per unit
    pub capacity: i64,
    /// Price per night in MZN
    pub base_price: f64,
    pub total_units: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RatePlan {
    pub id: String,
    pub hotel_id: String,
    pub name: String,
    pub discount_percent: f64,
    pub min_nights: i64,
    pub is_refundable: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Rides & Event spaces
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RideStatus {
    Scheduled,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ride {
    pub id: String,
    pub driver_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub total_seats: i64,
    pub price_per_seat: f64,
    pub vehicle: Option<String>,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSpace {
    pub id: String,
    pub manager_id: String,
    pub name: String,
    pub description: Option<String>,
    pub city: String,
    pub capacity: i64,
    pub price_per_day: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Bookings
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ServiceType {
    Ride,
    Hotel,
    Event,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Ride => "ride",
            ServiceType::Hotel => "hotel",
            ServiceType::Event => "event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Active bookings hold inventory
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub service_type: ServiceType,
    pub hotel_id: Option<String>,
    pub room_type_id: Option<String>,
    pub rate_plan_id: Option<String>,
    pub ride_id: Option<String>,
    pub event_space_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Rooms for hotels, seats for rides, 1 for events
    pub units: i64,
    pub guests: i64,
    pub total_price: f64,
    pub status: BookingStatus,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================
// Reviews
// ============================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: String,
    pub hotel_id: String,
    pub user_id: String,
    pub booking_id: Option<String>,
    pub rating: i64,
    pub title: Option<String>,
    pub comment: String,
    pub is_verified: bool,
    pub helpful_count: i64,
    pub manager_response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review joined with the author's display name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub author_name: String,
}

// ============================================
// Pagination
// ============================================

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: PageRequest, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + page.limit - 1) / page.limit
        };
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
