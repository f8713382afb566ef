pub mod ai;
pub mod client;
pub mod email;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::hub_routes()
}
