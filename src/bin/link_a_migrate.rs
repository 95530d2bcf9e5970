//! Link-A legacy data import
//!
//! Copies hotels and bookings from the pre-marketplace schema into the
//! current one. Safe to run repeatedly.
//!
//! Usage:
//!   cargo run --bin link_a_migrate
//!
//! Environment:
//!   DATABASE_URL              - Target database (default: sqlite://link_a.db?mode=rwc)
//!   LINKA_LEGACY_MANAGER_ID   - User id that will own the imported hotels (required)
//!   LINKA_LEGACY_DB           - SQLite file with the legacy tables (default: main database)
//!   RUST_LOG                  - Log level (default: info)

use link_a::db::{self, legacy};
use link_a::models::AppConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let manager_id = std::env::var("LINKA_LEGACY_MANAGER_ID")
        .map_err(|_| eyre::eyre!("LINKA_LEGACY_MANAGER_ID must be set to the owner of imported hotels"))?;
    let attach_path = std::env::var("LINKA_LEGACY_DB").ok().filter(|p| !p.trim().is_empty());

    config.log_summary();
    match &attach_path {
        Some(path) => info!("Reading legacy tables from {}", path),
        None => info!("Reading legacy tables from the main database"),
    }

    let pool = db::connect(&config).await?;
    let report = legacy::migrate_legacy_schema(
        &pool,
        &legacy::LegacyOptions {
            manager_id,
            attach_path,
        },
    )
    .await?;

    info!("Import complete:");
    info!("  hotels:           {}", report.hotels);
    info!("  room types:       {}", report.room_types);
    info!("  bookings:         {}", report.bookings);
    info!("  skipped bookings: {}", report.skipped_bookings);

    pool.close().await;
    Ok(())
}
