use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::repo_types::User, properties::repo_types::Property};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub property_id: Uuid,
    pub booking_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Review joined with the reviewed listing and its author.
#[derive(Debug, Clone)]
pub struct ReviewDetails {
    pub review: Review,
    pub property: Property,
    pub reviewer: User,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub property_id: Uuid,
    pub booking_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

/// Aggregate over a listing's live reviews. The average is 0 with no reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub property_id: Uuid,
    pub average_rating: f64,
    pub review_count: i64,
}
