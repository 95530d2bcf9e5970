//! API Request Handlers
//!
//! One submodule per resource. Handlers extract, call the service, and wrap
//! the result in the JSON envelope.

pub mod auth;
pub mod bookings;
pub mod event_spaces;
pub mod hotels;
pub mod reviews;
pub mod rides;

use axum::extract::{Json, State};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::middleware::{RateLimitConfig, RateLimiter};
use super::types::*;
use crate::auth::{require_admin, AuthUser, IdentityVerifier, TokenCache};
use crate::models::{AppConfig, AppError, AppResult};
use crate::utils::stats::MarketplaceStats;

/// Shared application state
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub token_cache: TokenCache,
    pub rate_limiter: Arc<RateLimiter>,
    pub stats: Arc<MarketplaceStats>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state and start the background cleanup of the token cache
    /// and rate limiter. Must be called inside a Tokio runtime.
    pub fn new(db: SqlitePool, config: AppConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let token_cache = TokenCache::new(config.token_cache_ttl);
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::per_minute(
            config.rate_limit_per_minute,
        )));

        let cache_clone = token_cache.clone();
        let limiter_clone = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let tokens = cache_clone.cleanup_expired();
                let windows = limiter_clone.cleanup();
                if tokens + windows > 0 {
                    debug!("Cleanup: {} expired tokens, {} idle rate windows", tokens, windows);
                }
            }
        });

        Self {
            db,
            config,
            verifier,
            token_cache,
            rate_limiter,
            stats: Arc::new(MarketplaceStats::new()),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            "unavailable"
        }
    };

    let data = HealthData {
        status: if database == "ok" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data))
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ApiResponse<StatsData>>> {
    require_admin(&user)?;

    let data = StatsData {
        marketplace: state.stats.snapshot(),
        token_cache: state.token_cache.stats(),
        uptime_seconds: state.uptime_seconds(),
        api_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Ok(Json(ApiResponse::success(data)))
}

/// Unknown routes still answer with the envelope
pub async fn not_found() -> AppError {
    AppError::not_found("Route")
}
