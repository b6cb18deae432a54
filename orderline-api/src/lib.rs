use axum::{extract::State, http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use orderline_store::app_config::Role;

pub mod error;
pub mod items;
pub mod orders;
pub mod state;
pub mod users;

pub use state::AppState;

/// Router for the services `state.role` hosts, plus `/health`.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
            axum::http::HeaderName::from_static(orders::REQUEST_TIMEOUT_HEADER),
        ]);

    let mut router = Router::new().route("/health", get(health));
    if matches!(state.role, Role::All | Role::Users) {
        router = router.merge(users::routes());
    }
    if matches!(state.role, Role::All | Role::Inventory) {
        router = router.merge(items::routes());
    }
    if matches!(state.role, Role::All | Role::Orders) {
        router = router.merge(orders::routes());
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "role": state.role }))
}
