use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use orderline_core::{NewUser, User};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(create_user))
        .route("/v1/users/{id}", get(get_user))
}

/// POST /v1/users
async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(new_user) = payload?;
    let user = state.users.create_user(new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /v1/users/{id}
async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_user(&id).await?))
}
