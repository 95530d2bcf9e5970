//! Link-A Marketplace Library
//!
//! Booking backend for the Mozambican market:
//! - Hotels with room types, seasonal rate plans and availability
//! - Ride sharing with per-seat pricing
//! - Event spaces booked by the day
//! - Bookings, cancellations with refunds and verified reviews
//! - Import of the legacy hotel schema

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use api::{create_router, AppState};
pub use models::{AppConfig, AppError, AppResult, ErrorCode};
