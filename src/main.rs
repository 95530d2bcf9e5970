//! Link-A API Server
//!
//! Usage:
//!   cargo run --bin link_a_api
//!
//! Environment:
//!   LINKA_HOST / LINKA_PORT   - Bind address (PORT also honoured)
//!   DATABASE_URL              - SQLite database (default: sqlite://link_a.db?mode=rwc)
//!   FIREBASE_API_KEY          - Firebase Web API key for token verification
//!   LINKA_DEV_AUTH            - Accept dev:<uid>:<email> tokens when no key is set
//!   RUST_LOG                  - Log level (default: info)

use link_a::api::{create_router, AppState};
use link_a::models::AppConfig;
use link_a::{auth, db};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    config.log_summary();

    let pool = db::connect(&config).await?;
    let verifier = auth::verifier_from_config(&config)?;
    info!("Identity verifier: {}", verifier.name());

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(pool.clone(), config, verifier));
    let stats = state.stats.clone();
    let app = create_router(state);

    info!("Link-A API starting on http://{}", addr);
    info!("");
    info!("Endpoints:");
    info!("  POST /api/auth/register            - Create account for a Firebase user");
    info!("  GET  /api/hotels                   - Search hotels");
    info!("  GET  /api/hotels/:id/availability  - Room availability and quotes");
    info!("  GET  /api/rides                    - Search rides");
    info!("  GET  /api/event-spaces             - Search event spaces");
    info!("  POST /api/bookings                 - Book a hotel, ride or event space");
    info!("  GET  /api/reviews/hotels/:id       - Hotel reviews");
    info!("  GET  /health                       - Health check");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Shutdown signal received, closing database...");
    let snapshot = stats.snapshot();
    info!("  bookings this run:      {}", snapshot.bookings_created);
    info!("  cancellations this run: {}", snapshot.bookings_cancelled);
    pool.close().await;

    info!("Link-A API shutdown complete");
    Ok(())
}
