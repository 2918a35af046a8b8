use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::error::BookingError;
use crate::services::auth::Credentials;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, BookingError> {
    let user = state.auth.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "username": user.username })),
    ))
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, BookingError> {
    let token = state.auth.authenticate(req).await?;
    Ok((StatusCode::OK, Json(token)))
}
