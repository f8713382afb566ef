pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod pin;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
