use axum::Router;
use axum::routing::get;
use crate::state::AppState;

pub mod broadcaster;
pub mod events;
pub mod gateway;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(gateway::ws_handler))
}
