use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::repo::users_by_ids,
    error::{StoreError, StoreResult},
    properties::repo::properties_by_ids,
    reviews::repo_types::{NewReview, RatingSummary, Review, ReviewDetails},
};

const REVIEW_COLUMNS: &str =
    "id, property_id, booking_id, reviewer_id, rating, comment, created_at, updated_at";

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Fails with `Conflict` when the booking already has a live review.
    async fn create(&self, review: NewReview) -> StoreResult<Review>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<ReviewDetails>>;
    async fn get_by_booking(&self, booking_id: Uuid) -> StoreResult<Option<Review>>;
    async fn list_by_property(
        &self,
        property_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>>;
    async fn list_by_reviewer(
        &self,
        reviewer_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>>;
    async fn list_all(&self, offset: i64, limit: i64) -> StoreResult<Vec<ReviewDetails>>;
    async fn update(&self, review: &Review) -> StoreResult<Review>;
    async fn soft_delete(&self, id: Uuid) -> StoreResult<()>;
    async fn rating(&self, property_id: Uuid) -> StoreResult<RatingSummary>;
}

#[derive(Clone)]
pub struct PgReviewStore {
    db: PgPool,
}

impl PgReviewStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn hydrate(&self, reviews: Vec<Review>) -> StoreResult<Vec<ReviewDetails>> {
        let property_ids: Vec<Uuid> = reviews.iter().map(|r| r.property_id).collect();
        let reviewer_ids: Vec<Uuid> = reviews.iter().map(|r| r.reviewer_id).collect();
        let properties = properties_by_ids(&self.db, &property_ids).await?;
        let reviewers = users_by_ids(&self.db, &reviewer_ids).await?;

        reviews
            .into_iter()
            .map(|review| {
                match (
                    properties.get(&review.property_id),
                    reviewers.get(&review.reviewer_id),
                ) {
                    (Some(property), Some(reviewer)) => Ok(ReviewDetails {
                        property: property.clone(),
                        reviewer: reviewer.clone(),
                        review,
                    }),
                    _ => Err(StoreError::Unavailable(format!(
                        "review {} references a missing property or reviewer",
                        review.id
                    ))),
                }
            })
            .collect()
    }

    async fn list_where(
        &self,
        filter: &str,
        key: Option<Uuid>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>> {
        // `filter` is always a fixed fragment from this module, never user input.
        let sql = format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews
            WHERE deleted_at IS NULL {filter}
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        );
        let mut query = sqlx::query_as::<_, Review>(&sql).bind(limit).bind(offset);
        if let Some(key) = key {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.db).await?;
        self.hydrate(rows).await
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn create(&self, r: NewReview) -> StoreResult<Review> {
        let sql = format!(
            r#"
            INSERT INTO reviews (property_id, booking_id, reviewer_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REVIEW_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Review>(&sql)
            .bind(r.property_id)
            .bind(r.booking_id)
            .bind(r.reviewer_id)
            .bind(r.rating)
            .bind(&r.comment)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ReviewDetails>> {
        let sql =
            format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1 AND deleted_at IS NULL");
        let Some(row) = sqlx::query_as::<_, Review>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }

    async fn get_by_booking(&self, booking_id: Uuid) -> StoreResult<Option<Review>> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE booking_id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, Review>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn list_by_property(
        &self,
        property_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>> {
        self.list_where("AND property_id = $3", Some(property_id), offset, limit)
            .await
    }

    async fn list_by_reviewer(
        &self,
        reviewer_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<ReviewDetails>> {
        self.list_where("AND reviewer_id = $3", Some(reviewer_id), offset, limit)
            .await
    }

    async fn list_all(&self, offset: i64, limit: i64) -> StoreResult<Vec<ReviewDetails>> {
        self.list_where("", None, offset, limit).await
    }

    async fn update(&self, r: &Review) -> StoreResult<Review> {
        let sql = format!(
            r#"
            UPDATE reviews SET rating = $2, comment = $3, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {REVIEW_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Review>(&sql)
            .bind(r.id)
            .bind(r.rating)
            .bind(&r.comment)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn soft_delete(&self, id: Uuid) -> StoreResult<()> {
        let done =
            sqlx::query("UPDATE reviews SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.db)
                .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn rating(&self, property_id: Uuid) -> StoreResult<RatingSummary> {
        let (average_rating, review_count): (f64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(AVG(rating)::float8, 0), COUNT(*)
            FROM reviews
            WHERE property_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(property_id)
        .fetch_one(&self.db)
        .await?;
        Ok(RatingSummary {
            property_id,
            average_rating,
            review_count,
        })
    }
}
