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
    bookings::dto::{BookingResponse, CreateBookingRequest, UpdateBookingRequest},
    error::ServiceError,
    extract::{JsonBody, PathParam, QueryParams},
    pagination::Pagination,
    state::AppState,
};

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_my_bookings))
        .route("/bookings/:id", get(get_booking).put(update_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/properties/:id/bookings", get(list_property_bookings))
}

#[instrument(skip(state, payload))]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ServiceError> {
    let booking = state.bookings.create(user, payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[instrument(skip(state))]
pub async fn list_my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<BookingResponse>>, ServiceError> {
    Ok(Json(state.bookings.user_bookings(user, page).await?))
}

#[instrument(skip(state))]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<BookingResponse>, ServiceError> {
    Ok(Json(state.bookings.get(user, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_booking(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, ServiceError> {
    Ok(Json(state.bookings.update(user, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<BookingResponse>, ServiceError> {
    Ok(Json(state.bookings.cancel(user, id).await?))
}

#[instrument(skip(state))]
pub async fn list_property_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(property_id): PathParam<Uuid>,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<BookingResponse>>, ServiceError> {
    Ok(Json(
        state
            .bookings
            .property_bookings(user, property_id, page)
            .await?,
    ))
}
