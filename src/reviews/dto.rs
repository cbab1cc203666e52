use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::dto::PublicUser,
    error::{ServiceError, ServiceResult},
    properties::repo_types::Property,
    reviews::repo_types::{Review, ReviewDetails},
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

fn check_rating(rating: i32) -> ServiceResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ServiceError::invalid("rating must be between 1 and 5"));
    }
    Ok(())
}

fn check_comment(comment: &str) -> ServiceResult<()> {
    let len = comment.trim().chars().count();
    if !(10..=1000).contains(&len) {
        return Err(ServiceError::invalid(
            "comment must be between 10 and 1000 characters",
        ));
    }
    Ok(())
}

impl CreateReviewRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        check_rating(self.rating)?;
        check_comment(&self.comment)
    }
}

impl UpdateReviewRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(rating) = self.rating {
            check_rating(rating)?;
        }
        if let Some(comment) = &self.comment {
            check_comment(comment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: Review,
    pub property: Property,
    pub reviewer: PublicUser,
}

impl From<ReviewDetails> for ReviewResponse {
    fn from(d: ReviewDetails) -> Self {
        Self {
            reviewer: PublicUser::from(&d.reviewer),
            property: d.property,
            review: d.review,
        }
    }
}
