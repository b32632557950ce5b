use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod password;
pub mod repo;
pub mod resume;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
