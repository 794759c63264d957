use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{Movie, MovieList, SuccessResponse},
};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Movie>> {
    Ok(Json(state.cache.movie(&id).await?))
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<MovieList>> {
    let page = parse_page(params.get("page").map(String::as_str))?;
    Ok(Json(state.cache.movies(page).await?))
}

pub async fn save_movie(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Movie>, JsonRejection>,
) -> AppResult<Json<SuccessResponse>> {
    let Json(movie) = body.map_err(|err| {
        tracing::debug!(error = %err, "rejected movie payload");
        AppError::validation("Invalid request body")
    })?;

    state.cache.save(&movie).await?;
    Ok(Json(SuccessResponse { message: "Movie saved successfully".to_string() }))
}

fn parse_page(raw: Option<&str>) -> AppResult<u32> {
    let page: i64 = match raw {
        None => return Ok(1),
        Some(raw) => raw.parse().map_err(|_| AppError::validation("Invalid page value"))?,
    };
    if page < 1 {
        return Err(AppError::validation("page must be a positive integer"));
    }
    u32::try_from(page).map_err(|_| AppError::validation("Invalid page value"))
}
