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
    dates::DateRange,
    error::ServiceError,
    extract::{JsonBody, PathParam, QueryParams},
    pagination::{Page, Pagination},
    properties::{
        dto::{
            AvailabilityQuery, AvailabilityResponse, CreatePropertyRequest, SearchQuery,
            UpdatePropertyRequest,
        },
        repo_types::Property,
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties))
        .route("/properties/search", get(search_properties))
        .route("/properties/:id", get(get_property))
        .route("/properties/:id/availability", get(check_availability))
        .route("/hosts/:id/properties", get(list_host_properties))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/properties", post(create_property))
        .route(
            "/properties/:id",
            axum::routing::put(update_property).delete(delete_property),
        )
        .route("/properties/:id/approve", post(approve_property))
}

#[instrument(skip(state))]
pub async fn list_properties(
    State(state): State<AppState>,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<Property>>, ServiceError> {
    Ok(Json(state.properties.list(page).await?))
}

#[instrument(skip(state))]
pub async fn search_properties(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<Page<Property>>, ServiceError> {
    Ok(Json(state.properties.search(query).await?))
}

#[instrument(skip(state))]
pub async fn get_property(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Property>, ServiceError> {
    Ok(Json(state.properties.get(id).await?))
}

#[instrument(skip(state))]
pub async fn check_availability(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
    QueryParams(q): QueryParams<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ServiceError> {
    let range = DateRange::new(q.check_in, q.check_out)?;
    Ok(Json(state.properties.check_availability(id, range).await?))
}

#[instrument(skip(state))]
pub async fn list_host_properties(
    State(state): State<AppState>,
    PathParam(host_id): PathParam<Uuid>,
    QueryParams(page): QueryParams<Pagination>,
) -> Result<Json<Vec<Property>>, ServiceError> {
    Ok(Json(state.properties.by_host(host_id, page).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_property(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<Property>), ServiceError> {
    let created = state.properties.create(user, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, payload))]
pub async fn update_property(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdatePropertyRequest>,
) -> Result<Json<Property>, ServiceError> {
    Ok(Json(state.properties.update(user, id, payload).await?))
}

#[instrument(skip(state))]
pub async fn delete_property(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.properties.delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn approve_property(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Property>, ServiceError> {
    Ok(Json(state.properties.approve(user, id).await?))
}
