use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::BookingError;
use crate::middleware::AuthUser;
use crate::services::booking::BookingRequest;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats", get(list_seats))
        .route("/seats/mine", get(list_my_seats))
        .route("/seats/book", post(book_manual))
        .route("/seats/auto", post(book_auto))
        .route("/seats/release", post(release_mine))
}

pub fn reset_route() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reset", post(reset_all))
}

/* ---------- SEATS ---------- */

// GET /api/seats - полный снимок, свободные и занятые
async fn list_seats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    let seats = state.cache.get_seats(&state.bookings).await?;
    Ok((StatusCode::OK, Json(seats)))
}

// GET /api/seats/mine
async fn list_my_seats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let seats = state.bookings.list_owned(user.user_id).await?;
    Ok((StatusCode::OK, Json(seats)))
}

/* ---------- BOOKINGS ---------- */

// POST /api/seats/book
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualBookingRequest {
    seat_ids: Vec<Uuid>,
}

async fn book_manual(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ManualBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let seats = state
        .bookings
        .book(user.user_id, BookingRequest::Manual(req.seat_ids))
        .await?;
    Ok((StatusCode::OK, Json(json!({ "seats": seats }))))
}

// POST /api/seats/auto
#[derive(Debug, Deserialize)]
struct AutoBookingRequest {
    count: usize,
}

async fn book_auto(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<AutoBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let seats = state
        .bookings
        .book(user.user_id, BookingRequest::Auto(req.count))
        .await?;
    Ok((StatusCode::OK, Json(json!({ "seats": seats }))))
}

// POST /api/seats/release - освободить все свои места
async fn release_mine(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let released = state.bookings.release(user.user_id).await?;
    Ok((StatusCode::OK, Json(json!({ "released": released }))))
}

// POST /api/reset - сброс всех броней (только при ENABLE_RESET, только с токеном)
async fn reset_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    warn!(user_id = %user.user_id, username = %user.username, "reset requested");
    let released = state.bookings.reset_all().await?;
    Ok((StatusCode::OK, Json(json!({ "released": released }))))
}
