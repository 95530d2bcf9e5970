//! API Route Configuration

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers::{self, auth, bookings, event_spaces, hotels, reviews, rides, AppState};
use super::middleware::{logging_middleware, rate_limit_middleware};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/api/stats", get(handlers::get_stats))
        // Accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/me", get(auth::me).put(auth::update_me))
        .route("/api/auth/roles", put(auth::set_roles))
        .route("/api/auth/users", get(auth::list_users))
        // Hotels
        .route("/api/hotels", get(hotels::search).post(hotels::create))
        .route(
            "/api/hotels/:id",
            get(hotels::get).put(hotels::update).delete(hotels::delete),
        )
        .route(
            "/api/hotels/:id/room-types",
            get(hotels::list_room_types).post(hotels::create_room_type),
        )
        .route(
            "/api/hotels/:id/rate-plans",
            get(hotels::list_rate_plans).post(hotels::create_rate_plan),
        )
        .route("/api/hotels/:id/availability", get(hotels::availability))
        // Rides
        .route("/api/rides", get(rides::search).post(rides::create))
        .route("/api/rides/:id", get(rides::get))
        // Event spaces
        .route(
            "/api/event-spaces",
            get(event_spaces::search).post(event_spaces::create),
        )
        .route("/api/event-spaces/:id", get(event_spaces::get))
        // Bookings
        .route("/api/bookings", get(bookings::list).post(bookings::create))
        .route("/api/bookings/:id", get(bookings::get))
        .route("/api/bookings/:id/cancel", post(bookings::cancel))
        .route("/api/bookings/:id/confirm", post(bookings::confirm))
        // Reviews
        .route(
            "/api/reviews/hotels/:hotel_id",
            get(reviews::list_for_hotel).post(reviews::create),
        )
        .route("/api/reviews/hotels/:hotel_id/stats", get(reviews::stats_for_hotel))
        .route("/api/reviews/:id", put(reviews::update))
        .route("/api/reviews/:id/helpful", post(reviews::mark_helpful))
        .route("/api/reviews/:id/response", post(reviews::respond))
        .fallback(handlers::not_found)
        // Middleware (order matters - bottom runs first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}
