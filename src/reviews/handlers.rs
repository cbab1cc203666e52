use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ServiceError,
    extract::{JsonBody, PathParam, QueryParams},
    pagination::Pagination,
    reviews::{
        dto::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest},
        repo_types::RatingSummary,
    },
    state::AppState,
};

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", post(create_review).get(list_all_reviews))
        .route("/reviews/mine", get(list_my_reviews))
        .route(
            "/reviews/:id",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/properties/:id/reviews", get(list_property_reviews))
        .route("/properties/:id/rating", get(get_property_rating))
}

#[instrument(skip(state, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ServiceError> {
    let review = state.reviews.create(user, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state))]
pub async fn list_all_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<ReviewResponse>>, ServiceError> {
    Ok(Json(state.reviews.all_reviews(user, page).await?))
}

#[instrument(skip(state))]
pub async fn list_my_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<ReviewResponse>>, ServiceError> {
    Ok(Json(state.reviews.user_reviews(user, page).await?))
}

#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<ReviewResponse>, ServiceError> {
    Ok(Json(state.reviews.get(id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, ServiceError> {
    Ok(Json(state.reviews.update(user, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.reviews.delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_property_reviews(
    State(state): State<AppState>,
    PathParam(property_id): PathParam<Uuid>,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<ReviewResponse>>, ServiceError> {
    Ok(Json(state.reviews.property_reviews(property_id, page).await?))
}

#[instrument(skip(state))]
pub async fn get_property_rating(
    State(state): State<AppState>,
    PathParam(property_id): PathParam<Uuid>,
) -> Result<Json<RatingSummary>, ServiceError> {
    Ok(Json(state.reviews.property_rating(property_id).await?))
}
