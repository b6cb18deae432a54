use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

use orderline_core::{NewOrder, Order, ServiceError};

use crate::error::AppError;
use crate::state::AppState;

/// Caller-supplied deadline for the whole order placement, in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/stream", get(order_stream))
        .route("/v1/orders/{id}", get(get_order))
}

fn request_budget(headers: &HeaderMap) -> Result<Option<Duration>, ServiceError> {
    let Some(raw) = headers.get(REQUEST_TIMEOUT_HEADER) else {
        return Ok(None);
    };
    let millis = raw
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .ok_or_else(|| ServiceError::invalid_input(format!("{} must be a positive integer", REQUEST_TIMEOUT_HEADER)))?;
    Ok(Some(Duration::from_millis(millis)))
}

/// POST /v1/orders
async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(request) = payload?;
    let order = match request_budget(&headers)? {
        Some(budget) => state.coordinator.create_order_within(request, budget).await?,
        None => state.coordinator.create_order(request).await?,
    };
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders/{id}
async fn get_order(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Order>, AppError> {
    Ok(Json(state.coordinator.get_order(&id).await?))
}

#[derive(Debug, Deserialize)]
struct StreamFilter {
    item_id: Option<String>,
}

/// GET /v1/orders/stream
/// Server-sent `order_placed` events, optionally for one item only.
async fn order_stream(
    State(state): State<AppState>,
    Query(filter): Query<StreamFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let item_id = filter.item_id.clone();
        async move {
            // Lagged receivers skip what they missed
            let event = result.ok()?;
            if item_id.is_some_and(|id| id != event.item_id) {
                return None;
            }
            Event::default()
                .event("order_placed")
                .json_data(&event)
                .ok()
                .map(Ok::<_, Infallible>)
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
