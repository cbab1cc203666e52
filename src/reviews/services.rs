use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    bookings::{repo::BookingStore, repo_types::BookingStatus},
    error::{ServiceError, ServiceResult, StoreError},
    pagination::Pagination,
    properties::repo::PropertyStore,
    reviews::{
        dto::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest},
        repo::ReviewStore,
        repo_types::{NewReview, RatingSummary, ReviewDetails},
    },
};

pub const REVIEW_NOT_FOUND: &str = "review not found";
pub const NOT_YOUR_BOOKING: &str = "only the guest may review their own booking";
pub const NOT_COMPLETED: &str = "you can only review completed bookings";
pub const ALREADY_REVIEWED: &str = "review already exists for this booking";
pub const UPDATE_FORBIDDEN: &str = "you can only update your own reviews";
pub const DELETE_FORBIDDEN: &str = "you can only delete your own reviews";

pub struct ReviewService {
    reviews: Arc<dyn ReviewStore>,
    bookings: Arc<dyn BookingStore>,
    properties: Arc<dyn PropertyStore>,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        bookings: Arc<dyn BookingStore>,
        properties: Arc<dyn PropertyStore>,
    ) -> Self {
        Self {
            reviews,
            bookings,
            properties,
        }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<ReviewDetails> {
        self.reviews
            .get(id)
            .await
            .map_err(ServiceError::store("failed to get review"))?
            .ok_or_else(|| ServiceError::not_found(REVIEW_NOT_FOUND))
    }

    /// One review per completed booking, written by that booking's guest.
    #[instrument(skip(self, req), fields(user_id = %user.id, booking_id = %req.booking_id))]
    pub async fn create(
        &self,
        user: AuthUser,
        req: CreateReviewRequest,
    ) -> ServiceResult<ReviewResponse> {
        req.validate()?;

        let booking = self
            .bookings
            .get(req.booking_id)
            .await
            .map_err(ServiceError::store("failed to get booking"))?
            .ok_or_else(|| ServiceError::not_found("booking not found"))?
            .booking;
        if booking.guest_id != user.id {
            return Err(ServiceError::forbidden(NOT_YOUR_BOOKING));
        }
        if booking.status != BookingStatus::Completed {
            return Err(ServiceError::forbidden(NOT_COMPLETED));
        }

        let existing = self
            .reviews
            .get_by_booking(booking.id)
            .await
            .map_err(ServiceError::store("failed to check existing review"))?;
        if existing.is_some() {
            return Err(ServiceError::conflict(ALREADY_REVIEWED));
        }

        let created = self
            .reviews
            .create(NewReview {
                property_id: booking.property_id,
                booking_id: booking.id,
                reviewer_id: user.id,
                rating: req.rating,
                comment: req.comment.trim().to_string(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(detail) => {
                    warn!(%detail, "concurrent review for the same booking");
                    ServiceError::conflict(ALREADY_REVIEWED)
                }
                other => ServiceError::store("failed to create review")(other),
            })?;

        info!(review_id = %created.id, rating = created.rating, "review created");
        Ok(self.load(created.id).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> ServiceResult<ReviewResponse> {
        Ok(self.load(id).await?.into())
    }

    #[instrument(skip(self, patch), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: AuthUser,
        id: Uuid,
        patch: UpdateReviewRequest,
    ) -> ServiceResult<ReviewResponse> {
        let details = self.load(id).await?;
        if details.review.reviewer_id != user.id {
            return Err(ServiceError::forbidden(UPDATE_FORBIDDEN));
        }
        patch.validate()?;

        let mut review = details.review.clone();
        if let Some(rating) = patch.rating {
            review.rating = rating;
        }
        if let Some(comment) = patch.comment {
            review.comment = comment.trim().to_string();
        }
        let saved = self
            .reviews
            .update(&review)
            .await
            .map_err(ServiceError::store("failed to update review"))?;

        info!(review_id = %id, "review updated");
        Ok(ReviewDetails {
            review: saved,
            ..details
        }
        .into())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn delete(&self, user: AuthUser, id: Uuid) -> ServiceResult<()> {
        let details = self.load(id).await?;
        if details.review.reviewer_id != user.id && !user.role.is_admin() {
            return Err(ServiceError::forbidden(DELETE_FORBIDDEN));
        }
        self.reviews
            .soft_delete(id)
            .await
            .map_err(ServiceError::store("failed to delete review"))?;
        info!(review_id = %id, "review deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn property_reviews(
        &self,
        property_id: Uuid,
        page: Pagination,
    ) -> ServiceResult<Vec<ReviewResponse>> {
        let page = page.normalized();
        let rows = self
            .reviews
            .list_by_property(property_id, page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get property reviews"))?;
        Ok(rows.into_iter().map(ReviewResponse::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn user_reviews(
        &self,
        user: AuthUser,
        page: Pagination,
    ) -> ServiceResult<Vec<ReviewResponse>> {
        let page = page.normalized();
        let rows = self
            .reviews
            .list_by_reviewer(user.id, page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get user reviews"))?;
        Ok(rows.into_iter().map(ReviewResponse::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn all_reviews(
        &self,
        user: AuthUser,
        page: Pagination,
    ) -> ServiceResult<Vec<ReviewResponse>> {
        if !user.role.is_admin() {
            return Err(ServiceError::forbidden("only admins can list all reviews"));
        }
        let page = page.normalized();
        let rows = self
            .reviews
            .list_all(page.offset(), page.limit)
            .await
            .map_err(ServiceError::store("failed to get all reviews"))?;
        Ok(rows.into_iter().map(ReviewResponse::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn property_rating(&self, property_id: Uuid) -> ServiceResult<RatingSummary> {
        self.properties
            .get(property_id)
            .await
            .map_err(ServiceError::store("failed to get property"))?
            .ok_or_else(|| ServiceError::not_found("property not found"))?;
        self.reviews
            .rating(property_id)
            .await
            .map_err(ServiceError::store("failed to get average rating"))
    }
}
