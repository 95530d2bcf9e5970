//! Hotel reviews: submission, listing, stats and manager responses

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_owner_or_admin;
use crate::db::begin_write;
use crate::models::{
    AppError, AppResult, ErrorCode, Page, PageRequest, Pagination, Review, ReviewWithAuthor, User,
};
use crate::services::{hotels, trim_in_place, trim_opt, Normalize};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i64,
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 2000, message = "must be 10-2000 characters"))]
    pub comment: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: Option<i64>,
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 2000, message = "must be 10-2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondRequest {
    #[validate(length(min = 2, max = 2000))]
    pub response: String,
}

impl Normalize for CreateReviewRequest {
    fn trim_fields(&mut self) {
        trim_opt(&mut self.title);
        trim_in_place(&mut self.comment);
    }
}

impl Normalize for UpdateReviewRequest {
    fn trim_fields(&mut self) {
        trim_opt(&mut self.title);
        trim_opt(&mut self.comment);
    }
}

impl Normalize for RespondRequest {
    fn trim_fields(&mut self) {
        trim_in_place(&mut self.response);
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSort {
    #[default]
    Newest,
    Oldest,
    Highest,
    Lowest,
    Helpful,
}

impl ReviewSort {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("newest") => Ok(Self::Newest),
            Some("oldest") => Ok(Self::Oldest),
            Some("highest") => Ok(Self::Highest),
            Some("lowest") => Ok(Self::Lowest),
            Some("helpful") => Ok(Self::Helpful),
            Some(other) => Err(AppError::bad_request(format!(
                "Unknown sort '{}': use newest, oldest, highest, lowest or helpful",
                other
            ))),
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "r.created_at DESC, r.id",
            Self::Oldest => "r.created_at ASC, r.id",
            Self::Highest => "r.rating DESC, r.created_at DESC",
            Self::Lowest => "r.rating ASC, r.created_at DESC",
            Self::Helpful => "r.helpful_count DESC, r.created_at DESC",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewStats {
    pub hotel_id: String,
    /// One decimal, 0 without reviews
    pub average_rating: f64,
    pub total_reviews: i64,
    pub verified_reviews: i64,
    /// Stars (1-5) to review count, every key present
    pub distribution: BTreeMap<i64, i64>,
}

const SELECT_WITH_AUTHOR: &str =
    "SELECT r.*, u.full_name AS author_name FROM reviews r JOIN users u ON u.id = r.user_id";

async fn load(conn: &mut SqliteConnection, id: &str) -> AppResult<Review> {
    sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))
}

async fn load_with_author(conn: &mut SqliteConnection, id: &str) -> AppResult<ReviewWithAuthor> {
    sqlx::query_as::<_, ReviewWithAuthor>(&format!("{} WHERE r.id = ?", SELECT_WITH_AUTHOR))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))
}

/// Refresh the denormalized `rating` and `review_count` on the hotel row
async fn recompute_hotel_rating(conn: &mut SqliteConnection, hotel_id: &str) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE hotels SET
            rating = COALESCE((SELECT ROUND(AVG(rating), 1) FROM reviews WHERE hotel_id = ?1), 0),
            review_count = (SELECT COUNT(*) FROM reviews WHERE hotel_id = ?1),
            updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(hotel_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn clean_title(raw: Option<String>) -> Option<String> {
    raw.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

pub async fn create(
    db: &SqlitePool,
    user: &User,
    hotel_id: &str,
    req: CreateReviewRequest,
) -> AppResult<ReviewWithAuthor> {
    let req = req.normalized()?;
    let hotel = hotels::get_active(db, hotel_id).await?;
    if hotel.manager_id == user.id {
        return Err(AppError::forbidden("Managers cannot review their own hotel"));
    }

    let mut tx = begin_write(db).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE hotel_id = ? AND user_id = ?")
        .bind(hotel_id)
        .bind(&user.id)
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Err(AppError::conflict(
            ErrorCode::ReviewDuplicate,
            "You have already reviewed this hotel",
        ));
    }

    // a stay that went ahead makes the review verified
    let booking_id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM bookings
        WHERE user_id = ? AND hotel_id = ? AND service_type = 'hotel'
          AND status IN ('confirmed', 'completed')
        ORDER BY end_date DESC
        LIMIT 1
        "#,
    )
    .bind(&user.id)
    .bind(hotel_id)
    .fetch_optional(&mut *tx)
    .await?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO reviews (id, hotel_id, user_id, booking_id, rating, title, comment, is_verified,
                             helpful_count, manager_response, responded_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(hotel_id)
    .bind(&user.id)
    .bind(&booking_id)
    .bind(req.rating)
    .bind(clean_title(req.title))
    .bind(&req.comment)
    .bind(booking_id.is_some())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    recompute_hotel_rating(&mut *tx, hotel_id).await?;
    let review = load_with_author(&mut *tx, &id).await?;
    tx.commit().await?;

    info!(
        review_id = %id,
        hotel_id = %hotel_id,
        rating = req.rating,
        verified = review.review.is_verified,
        "review created"
    );
    Ok(review)
}

pub async fn list_for_hotel(
    db: &SqlitePool,
    hotel_id: &str,
    query: &ReviewListQuery,
) -> AppResult<Page<ReviewWithAuthor>> {
    let sort = ReviewSort::parse(query.sort.as_deref())?;
    let page = PageRequest::new(query.page, query.limit);
    hotels::get_active(db, hotel_id).await?;

    let mut conn = db.acquire().await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE hotel_id = ?")
        .bind(hotel_id)
        .fetch_one(&mut *conn)
        .await?;

    let sql = format!(
        "{} WHERE r.hotel_id = ? ORDER BY {} LIMIT ? OFFSET ?",
        SELECT_WITH_AUTHOR,
        sort.order_by()
    );
    let items = sqlx::query_as::<_, ReviewWithAuthor>(&sql)
        .bind(hotel_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}

pub async fn stats_for_hotel(db: &SqlitePool, hotel_id: &str) -> AppResult<ReviewStats> {
    hotels::get_active(db, hotel_id).await?;

    let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        "SELECT rating, COUNT(*), SUM(is_verified) FROM reviews WHERE hotel_id = ? GROUP BY rating",
    )
    .bind(hotel_id)
    .fetch_all(db)
    .await?;

    let mut distribution: BTreeMap<i64, i64> = (1..=5).map(|stars| (stars, 0)).collect();
    let mut total = 0;
    let mut verified = 0;
    let mut sum = 0;
    for (rating, count, verified_count) in rows {
        distribution.insert(rating, count);
        total += count;
        verified += verified_count;
        sum += rating * count;
    }

    let average_rating = if total == 0 {
        0.0
    } else {
        (sum as f64 / total as f64 * 10.0).round() / 10.0
    };

    Ok(ReviewStats {
        hotel_id: hotel_id.to_string(),
        average_rating,
        total_reviews: total,
        verified_reviews: verified,
        distribution,
    })
}

/// Author edits their own review
pub async fn update(
    db: &SqlitePool,
    user: &User,
    review_id: &str,
    req: UpdateReviewRequest,
) -> AppResult<ReviewWithAuthor> {
    let req = req.normalized()?;

    let mut tx = begin_write(db).await?;
    let review = load(&mut *tx, review_id).await?;
    if review.user_id != user.id {
        return Err(AppError::forbidden("Only the author can edit this review"));
    }

    let title = match req.title {
        Some(title) => clean_title(Some(title)),
        None => review.title,
    };
    let comment = req
        .comment
        .as_deref()
        .unwrap_or(&review.comment)
        .to_string();

    sqlx::query("UPDATE reviews SET rating = ?, title = ?, comment = ?, updated_at = ? WHERE id = ?")
        .bind(req.rating.unwrap_or(review.rating))
        .bind(&title)
        .bind(&comment)
        .bind(Utc::now())
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    recompute_hotel_rating(&mut *tx, &review.hotel_id).await?;
    let updated = load_with_author(&mut *tx, review_id).await?;
    tx.commit().await?;
    Ok(updated)
}

pub async fn mark_helpful(db: &SqlitePool, review_id: &str) -> AppResult<ReviewWithAuthor> {
    let mut conn = db.acquire().await?;

    let result = sqlx::query("UPDATE reviews SET helpful_count = helpful_count + 1 WHERE id = ?")
        .bind(review_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Review"));
    }

    load_with_author(&mut *conn, review_id).await
}

/// Hotel manager (or admin) answers a review. A second answer replaces the first.
pub async fn respond(
    db: &SqlitePool,
    user: &User,
    review_id: &str,
    req: RespondRequest,
) -> AppResult<ReviewWithAuthor> {
    let req = req.normalized()?;

    let hotel_id = {
        let mut conn = db.acquire().await?;
        load(&mut *conn, review_id).await?.hotel_id
    };
    let hotel = hotels::get(db, &hotel_id).await?;
    require_owner_or_admin(user, &hotel.manager_id)?;

    let mut conn = db.acquire().await?;
    let now = Utc::now();
    sqlx::query("UPDATE reviews SET manager_response = ?, responded_at = ?, updated_at = ? WHERE id = ?")
        .bind(&req.response)
        .bind(now)
        .bind(now)
        .bind(review_id)
        .execute(&mut *conn)
        .await?;

    info!(review_id = %review_id, by = %user.id, "review answered");
    load_with_author(&mut *conn, review_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Role;
    use crate::services::bookings::{self, CreateBookingRequest, HotelBookingRequest};
    use crate::services::hotels::tests::{hotel_request, insert_user, room_request};
    use chrono::Duration;

    fn review(rating: i64) -> CreateReviewRequest {
        CreateReviewRequest {
            rating,
            title: Some("Estadia".to_string()),
            comment: "Quartos limpos e pessoal simpático.".to_string(),
        }
    }

    async fn setup(pool: &SqlitePool) -> (User, String) {
        let manager = insert_user(pool, "m1", &[Role::HotelManager]).await;
        let hotel = hotels::create(pool, &manager, hotel_request("Polana", "Maputo")).await.unwrap();
        (manager, hotel.id)
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(ReviewSort::parse(None).unwrap(), ReviewSort::Newest);
        assert_eq!(ReviewSort::parse(Some("Highest")).unwrap(), ReviewSort::Highest);
        assert!(ReviewSort::parse(Some("random")).is_err());
    }

    #[tokio::test]
    async fn test_create_recomputes_rating_and_rejects_duplicates() {
        let pool = db::connect_in_memory().await.unwrap();
        let (_, hotel_id) = setup(&pool).await;
        let ana = insert_user(&pool, "ana", &[Role::Client]).await;
        let rui = insert_user(&pool, "rui", &[Role::Client]).await;

        let first = create(&pool, &ana, &hotel_id, review(5)).await.unwrap();
        assert_eq!(first.author_name, "User ana");
        assert!(!first.review.is_verified);
        create(&pool, &rui, &hotel_id, review(2)).await.unwrap();

        let hotel = hotels::get(&pool, &hotel_id).await.unwrap();
        assert_eq!(hotel.review_count, 2);
        assert_eq!(hotel.rating, 3.5);

        let err = create(&pool, &ana, &hotel_id, review(4)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReviewDuplicate);

        let err = create(
            &pool,
            &rui,
            &hotel_id,
            CreateReviewRequest {
                rating: 6,
                title: None,
                comment: "curto".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiValidation);
    }

    #[tokio::test]
    async fn test_text_limits_apply_after_trimming() {
        let pool = db::connect_in_memory().await.unwrap();
        let (manager, hotel_id) = setup(&pool).await;
        let ana = insert_user(&pool, "ana", &[Role::Client]).await;

        let padded = CreateReviewRequest {
            rating: 4,
            title: None,
            comment: format!("{}x", " ".repeat(12)),
        };
        let err = create(&pool, &ana, &hotel_id, padded).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiValidation);

        let created = create(
            &pool,
            &ana,
            &hotel_id,
            CreateReviewRequest {
                rating: 4,
                title: Some("   ".to_string()),
                comment: "  Boa localização, perto da praia.  ".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.review.comment, "Boa localização, perto da praia.");
        assert_eq!(created.review.title, None);
        let id = created.review.id;

        let err = update(
            &pool,
            &ana,
            &id,
            UpdateReviewRequest {
                rating: None,
                title: None,
                comment: Some(format!("ok{}", " ".repeat(20))),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiValidation);

        let err = respond(
            &pool,
            &manager,
            &id,
            RespondRequest {
                response: "  x  ".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiValidation);
    }

    #[tokio::test]
    async fn test_guest_with_booking_is_verified() {
        let pool = db::connect_in_memory().await.unwrap();
        let (manager, hotel_id) = setup(&pool).await;
        let room = hotels::create_room_type(&pool, &manager, &hotel_id, room_request(2, 4000.0, 3))
            .await
            .unwrap();
        let guest = insert_user(&pool, "g1", &[Role::Client]).await;

        let today = Utc::now().date_naive();
        bookings::create(
            &pool,
            &guest,
            CreateBookingRequest::Hotel(HotelBookingRequest {
                room_type_id: room.id,
                rate_plan_id: None,
                check_in: today + Duration::days(1),
                check_out: today + Duration::days(2),
                rooms: 1,
                guests: 2,
                special_requests: None,
            }),
        )
        .await
        .unwrap();

        let created = create(&pool, &guest, &hotel_id, review(4)).await.unwrap();
        assert!(created.review.is_verified);
        assert!(created.review.booking_id.is_some());

        let stats = stats_for_hotel(&pool, &hotel_id).await.unwrap();
        assert_eq!(stats.verified_reviews, 1);
    }

    #[tokio::test]
    async fn test_list_sorting_and_stats() {
        let pool = db::connect_in_memory().await.unwrap();
        let (_, hotel_id) = setup(&pool).await;

        let mut ids = Vec::new();
        for (i, rating) in [3, 5, 1, 4, 4].into_iter().enumerate() {
            let author = insert_user(&pool, &format!("u{}", i), &[Role::Client]).await;
            ids.push(create(&pool, &author, &hotel_id, review(rating)).await.unwrap().review.id);
        }
        mark_helpful(&pool, &ids[2]).await.unwrap();
        mark_helpful(&pool, &ids[2]).await.unwrap();

        let highest = list_for_hotel(
            &pool,
            &hotel_id,
            &ReviewListQuery {
                sort: Some("highest".to_string()),
                limit: Some(2),
                page: Some(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(highest.items.len(), 2);
        assert_eq!(highest.items[0].review.rating, 5);
        assert_eq!(highest.pagination.total, 5);
        assert_eq!(highest.pagination.total_pages, 3);

        let lowest = list_for_hotel(
            &pool,
            &hotel_id,
            &ReviewListQuery {
                sort: Some("lowest".to_string()),
                ..ReviewListQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(lowest.items[0].review.rating, 1);

        let helpful = list_for_hotel(
            &pool,
            &hotel_id,
            &ReviewListQuery {
                sort: Some("helpful".to_string()),
                ..ReviewListQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(helpful.items[0].review.id, ids[2]);
        assert_eq!(helpful.items[0].review.helpful_count, 2);

        let stats = stats_for_hotel(&pool, &hotel_id).await.unwrap();
        assert_eq!(stats.total_reviews, 5);
        assert_eq!(stats.average_rating, 3.4);
        assert_eq!(stats.distribution[&4], 2);
        assert_eq!(stats.distribution[&2], 0);
    }

    #[tokio::test]
    async fn test_update_and_respond_permissions() {
        let pool = db::connect_in_memory().await.unwrap();
        let (manager, hotel_id) = setup(&pool).await;
        let ana = insert_user(&pool, "ana", &[Role::Client]).await;
        let rui = insert_user(&pool, "rui", &[Role::Client]).await;

        let created = create(&pool, &ana, &hotel_id, review(2)).await.unwrap();
        let id = created.review.id.clone();

        let edit = || UpdateReviewRequest {
            rating: Some(4),
            title: None,
            comment: None,
        };
        assert_eq!(
            update(&pool, &rui, &id, edit()).await.unwrap_err().code,
            ErrorCode::AuthForbidden
        );
        let updated = update(&pool, &ana, &id, edit()).await.unwrap();
        assert_eq!(updated.review.rating, 4);
        assert_eq!(updated.review.title.as_deref(), Some("Estadia"));
        assert_eq!(hotels::get(&pool, &hotel_id).await.unwrap().rating, 4.0);

        let answer = || RespondRequest {
            response: "Obrigado pela visita!".to_string(),
        };
        assert!(respond(&pool, &ana, &id, answer()).await.is_err());
        let answered = respond(&pool, &manager, &id, answer()).await.unwrap();
        assert_eq!(answered.review.manager_response.as_deref(), Some("Obrigado pela visita!"));
        assert!(answered.review.responded_at.is_some());

        assert_eq!(mark_helpful(&pool, "missing").await.unwrap_err().code, ErrorCode::ApiNotFound);
    }
}
