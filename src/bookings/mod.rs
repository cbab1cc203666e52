use crate::state::AppState;
use axum::Router;

pub mod availability;
pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod transitions;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::booking_routes())
}
