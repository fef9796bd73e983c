use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use tower_http::limit::RequestBodyLimitLayer;
use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod handler;
pub mod model;
pub mod service;


pub fn router(upload_max_bytes: usize) -> Router<AppState> {
    // Uploads get their own ceiling in place of axum's default body limit.
    let upload = Router::new()
        .route("/videos/upload", post(handler::upload_and_transcode))
        .layer(RequestBodyLimitLayer::new(upload_max_bytes))
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .route("/transcode", post(handler::submit_transcode))
        .merge(upload)
}
