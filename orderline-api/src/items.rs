use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use orderline_core::{Item, NewItem, Reservation, StockRequest};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/items", post(create_item))
        .route("/v1/items/{id}", get(get_item))
        .route("/v1/items/{id}/reservations", post(reserve_stock))
        .route("/v1/items/{id}/reservations/{reservation_id}/commit", post(commit_stock))
        .route("/v1/items/{id}/reservations/{reservation_id}/release", post(release_stock))
}

/// POST /v1/items
async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let Json(new_item) = payload?;
    let item = state.inventory.create_item(new_item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /v1/items/{id}
async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Item>, AppError> {
    Ok(Json(state.inventory.get_item(&id).await?))
}

/// POST /v1/items/{id}/reservations
/// Atomically takes stock; answers with the reservation and the item as it stands afterwards.
async fn reserve_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StockRequest>, JsonRejection>,
) -> Result<Json<Reservation>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.inventory.reserve_stock(&id, request.quantity).await?))
}

/// POST /v1/items/{id}/reservations/{reservation_id}/commit
async fn commit_stock(
    State(state): State<AppState>,
    Path((id, reservation_id)): Path<(String, String)>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.inventory.commit_stock(&id, &reservation_id).await?))
}

/// POST /v1/items/{id}/reservations/{reservation_id}/release
/// Only an outstanding reservation can be handed back; committed stock answers 404.
async fn release_stock(
    State(state): State<AppState>,
    Path((id, reservation_id)): Path<(String, String)>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.inventory.release_stock(&id, &reservation_id).await?))
}
