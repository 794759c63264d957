pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod tmdb;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::cache::MovieCache;

#[derive(Clone)]
pub struct AppState {
    pub cache: MovieCache,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/movies", get(routes::list_movies).post(routes::save_movie))
        .route("/movies/{id}", get(routes::get_movie))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
