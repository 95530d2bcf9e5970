//! Import of the pre-marketplace hotel schema
//!
//! `legacy_hotels` and `legacy_bookings` are copied with `INSERT ... SELECT`
//! statements inside one transaction. `legacy_id_map` records every legacy
//! row already translated, so running the import again only picks up rows
//! added since the last run.
//!
//! The legacy tables either live in the main database or in a separate file
//! that is attached as `legacy` for the duration of the run.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::models::{AppError, AppResult};

/// Where the legacy tables are read from
#[derive(Debug, Clone)]
pub struct LegacyOptions {
    /// Owner of every imported hotel
    pub manager_id: String,
    /// SQLite file holding the legacy tables. `None` reads them from the main database.
    pub attach_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub hotels: u64,
    pub room_types: u64,
    pub bookings: u64,
    /// Legacy bookings with no matching user, hotel or a broken date range
    pub skipped_bookings: u64,
}

/// Rows of `legacy_bookings` that can be translated: known guest, imported
/// hotel, at least one night
const ELIGIBLE_BOOKING: &str = r#"
    EXISTS (SELECT 1 FROM users u WHERE u.email = LOWER(TRIM(lb.email)))
    AND EXISTS (SELECT 1 FROM legacy_id_map hm
                WHERE hm.legacy_table = 'legacy_hotels' AND hm.legacy_id = lb.hotel_id)
    AND DATE(lb.entrada) IS NOT NULL
    AND DATE(lb.saida) IS NOT NULL
    AND DATE(lb.saida) > DATE(lb.entrada)
"#;

const NOT_MAPPED_BOOKING: &str = r#"
    NOT EXISTS (SELECT 1 FROM legacy_id_map m
                WHERE m.legacy_table = 'legacy_bookings' AND m.legacy_id = lb.id)
"#;

pub async fn migrate_legacy_schema(pool: &SqlitePool, options: &LegacyOptions) -> AppResult<MigrationReport> {
    let mut conn = pool.acquire().await?;

    let src = match &options.attach_path {
        Some(path) => {
            sqlx::query("ATTACH DATABASE ? AS legacy")
                .bind(path)
                .execute(&mut *conn)
                .await?;
            "legacy"
        }
        None => "main",
    };

    let result = run(&mut *conn, src, &options.manager_id).await;

    if options.attach_path.is_some() {
        if let Err(e) = sqlx::query("DETACH DATABASE legacy").execute(&mut *conn).await {
            warn!("Failed to detach legacy database: {}", e);
        }
    }

    result
}

async fn run(conn: &mut SqliteConnection, src: &str, manager_id: &str) -> AppResult<MigrationReport> {
    let legacy_tables: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {src}.sqlite_master WHERE type = 'table' AND name IN ('legacy_hotels', 'legacy_bookings')"
    ))
    .fetch_one(&mut *conn)
    .await?;
    if legacy_tables != 2 {
        return Err(AppError::bad_request(format!(
            "legacy_hotels and legacy_bookings not found in schema '{}'",
            src
        )));
    }

    let manager: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(manager_id)
        .fetch_optional(&mut *conn)
        .await?;
    if manager.is_none() {
        return Err(AppError::not_found("Manager user"));
    }

    let now = Utc::now();
    let mut tx = conn.begin().await?;
    let mut report = MigrationReport::default();

    // ---- hotels ----
    for table in ["legacy_hotels", "legacy_room_types"] {
        sqlx::query(&format!(
            r#"
            INSERT INTO legacy_id_map (legacy_table, legacy_id, new_id)
            SELECT '{table}', lh.id, LOWER(HEX(RANDOMBLOB(16)))
            FROM {src}.legacy_hotels lh
            WHERE NOT EXISTS (SELECT 1 FROM legacy_id_map m
                              WHERE m.legacy_table = '{table}' AND m.legacy_id = lh.id)
            "#
        ))
        .execute(&mut *tx)
        .await?;
    }

    report.hotels = sqlx::query(&format!(
        r#"
        INSERT INTO hotels (id, manager_id, name, description, address, city, province,
                            star_rating, rating, review_count, is_active, created_at, updated_at)
        SELECT m.new_id,
               ?1,
               COALESCE(NULLIF(TRIM(lh.nome), ''), 'Hotel ' || lh.id),
               NULL,
               COALESCE(NULLIF(TRIM(lh.endereco), ''), '-'),
               COALESCE(NULLIF(TRIM(lh.cidade), ''), '-'),
               COALESCE(NULLIF(TRIM(lh.provincia), ''), NULLIF(TRIM(lh.cidade), ''), '-'),
               0, 0, 0,
               CASE LOWER(TRIM(COALESCE(lh.estado, '')))
                   WHEN 'ativo' THEN 1
                   WHEN 'active' THEN 1
                   ELSE 0
               END,
               ?2, ?2
        FROM {src}.legacy_hotels lh
        JOIN legacy_id_map m ON m.legacy_table = 'legacy_hotels' AND m.legacy_id = lh.id
        WHERE NOT EXISTS (SELECT 1 FROM hotels h WHERE h.id = m.new_id)
        "#
    ))
    .bind(manager_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    report.room_types = sqlx::query(&format!(
        r#"
        INSERT INTO room_types (id, hotel_id, name, description, capacity, base_price, total_units, is_active, created_at)
        SELECT rm.new_id,
               hm.new_id,
               'Standard',
               NULL,
               2,
               CASE WHEN lh.preco_noite > 0 THEN lh.preco_noite ELSE 1 END,
               MAX(COALESCE(lh.quartos, 1), 1),
               1,
               ?1
        FROM {src}.legacy_hotels lh
        JOIN legacy_id_map hm ON hm.legacy_table = 'legacy_hotels' AND hm.legacy_id = lh.id
        JOIN legacy_id_map rm ON rm.legacy_table = 'legacy_room_types' AND rm.legacy_id = lh.id
        WHERE NOT EXISTS (SELECT 1 FROM room_types rt WHERE rt.id = rm.new_id)
        "#
    ))
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // ---- bookings ----
    let skipped: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {src}.legacy_bookings lb WHERE {NOT_MAPPED_BOOKING} AND NOT ({ELIGIBLE_BOOKING})"
    ))
    .fetch_one(&mut *tx)
    .await?;
    report.skipped_bookings = skipped.max(0) as u64;

    sqlx::query(&format!(
        r#"
        INSERT INTO legacy_id_map (legacy_table, legacy_id, new_id)
        SELECT 'legacy_bookings', lb.id, LOWER(HEX(RANDOMBLOB(16)))
        FROM {src}.legacy_bookings lb
        WHERE {NOT_MAPPED_BOOKING} AND {ELIGIBLE_BOOKING}
        "#
    ))
    .execute(&mut *tx)
    .await?;

    report.bookings = sqlx::query(&format!(
        r#"
        INSERT INTO bookings (id, user_id, service_type, hotel_id, room_type_id, rate_plan_id, ride_id,
                              event_space_id, start_date, end_date, units, guests, total_price, status,
                              special_requests, created_at, updated_at)
        SELECT bm.new_id,
               u.id,
               'hotel',
               hm.new_id,
               rm.new_id,
               NULL, NULL, NULL,
               DATE(lb.entrada),
               DATE(lb.saida),
               MAX(COALESCE(lb.quartos, 1), 1),
               MAX(COALESCE(lb.quartos, 1), 1),
               MAX(COALESCE(lb.valor, 0), 0),
               CASE LOWER(TRIM(COALESCE(lb.estado, '')))
                   WHEN 'confirmada' THEN 'confirmed'
                   WHEN 'cancelada' THEN 'cancelled'
                   WHEN 'concluida' THEN 'completed'
                   WHEN 'concluída' THEN 'completed'
                   ELSE 'pending'
               END,
               NULL,
               ?1, ?1
        FROM {src}.legacy_bookings lb
        JOIN legacy_id_map bm ON bm.legacy_table = 'legacy_bookings' AND bm.legacy_id = lb.id
        JOIN users u ON u.email = LOWER(TRIM(lb.email))
        JOIN legacy_id_map hm ON hm.legacy_table = 'legacy_hotels' AND hm.legacy_id = lb.hotel_id
        JOIN legacy_id_map rm ON rm.legacy_table = 'legacy_room_types' AND rm.legacy_id = lb.hotel_id
        WHERE NOT EXISTS (SELECT 1 FROM bookings b WHERE b.id = bm.new_id)
        "#
    ))
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    info!(
        hotels = report.hotels,
        room_types = report.room_types,
        bookings = report.bookings,
        skipped = report.skipped_bookings,
        "legacy import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BookingStatus, Role};
    use crate::services::hotels::tests::insert_user;

    async fn seed_legacy(pool: &SqlitePool) {
        for sql in [
            r#"CREATE TABLE legacy_hotels (
                id INTEGER PRIMARY KEY, nome TEXT, endereco TEXT, cidade TEXT, provincia TEXT,
                preco_noite REAL, quartos INTEGER, estado TEXT)"#,
            r#"CREATE TABLE legacy_bookings (
                id INTEGER PRIMARY KEY, hotel_id INTEGER, email TEXT, entrada TEXT, saida TEXT,
                quartos INTEGER, valor REAL, estado TEXT)"#,
            r#"INSERT INTO legacy_hotels VALUES
                (1, 'Hotel Polana', 'Av. Julius Nyerere 1380', 'Maputo', 'Maputo', 9500, 12, 'ativo'),
                (2, 'Pensão Beira', 'Rua Major Serpa Pinto', 'Beira', NULL, 2200, 4, 'fechado')"#,
            r#"INSERT INTO legacy_bookings VALUES
                (10, 1, 'G1@linka.co.mz ', '2024-03-01', '2024-03-04', 1, 28500, 'confirmada'),
                (11, 1, 'g1@linka.co.mz', '2024-05-10', '2024-05-12', 2, 38000, 'cancelada'),
                (12, 2, 'g1@linka.co.mz', '2024-06-01', '2024-06-02', 1, 2200, 'reservada'),
                (13, 2, 'ninguem@example.com', '2024-06-01', '2024-06-02', 1, 2200, 'confirmada'),
                (14, 1, 'g1@linka.co.mz', '2024-07-01', '2024-07-01', 1, 9500, 'confirmada')"#,
        ] {
            sqlx::query(sql).execute(pool).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_migrates_and_maps_status() {
        let pool = db::connect_in_memory().await.unwrap();
        let manager = insert_user(&pool, "m1", &[Role::HotelManager]).await;
        insert_user(&pool, "g1", &[Role::Client]).await;
        seed_legacy(&pool).await;

        let options = LegacyOptions {
            manager_id: manager.id.clone(),
            attach_path: None,
        };
        let report = migrate_legacy_schema(&pool, &options).await.unwrap();
        assert_eq!(
            report,
            MigrationReport {
                hotels: 2,
                room_types: 2,
                bookings: 3,
                skipped_bookings: 2,
            }
        );

        let beira_active: bool = sqlx::query_scalar("SELECT is_active FROM hotels WHERE name = 'Pensão Beira'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(!beira_active);

        // same-day rows have no night to sell
        let zero_night: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE end_date <= start_date")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(zero_night, 0);

        let statuses: Vec<BookingStatus> =
            sqlx::query_scalar("SELECT status FROM bookings ORDER BY start_date")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            statuses,
            vec![BookingStatus::Confirmed, BookingStatus::Cancelled, BookingStatus::Pending]
        );

        // second run only reports what is still unmatched
        let again = migrate_legacy_schema(&pool, &options).await.unwrap();
        assert_eq!(again.hotels, 0);
        assert_eq!(again.room_types, 0);
        assert_eq!(again.bookings, 0);
        assert_eq!(again.skipped_bookings, 2);
    }

    #[tokio::test]
    async fn test_requires_legacy_tables_and_manager() {
        let pool = db::connect_in_memory().await.unwrap();
        let options = LegacyOptions {
            manager_id: "nobody".to_string(),
            attach_path: None,
        };
        assert_eq!(
            migrate_legacy_schema(&pool, &options).await.unwrap_err().code_str(),
            "API_BAD_REQUEST"
        );

        seed_legacy(&pool).await;
        assert_eq!(
            migrate_legacy_schema(&pool, &options).await.unwrap_err().code_str(),
            "API_NOT_FOUND"
        );
    }
}
