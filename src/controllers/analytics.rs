//! analytics.rs
//!
//! Статистика по вагону для отображения рядом со схемой мест:
//! всего, занято, свободно и свободные места по рядам.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;

use crate::error::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seats/stats", get(seat_stats))
}

/// GET /api/seats/stats
async fn seat_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    let stats = state.bookings.stats().await?;

    tracing::debug!(
        "Seat stats: {} total, {} booked, {} free",
        stats.total, stats.booked, stats.free
    );

    Ok((StatusCode::OK, Json(stats)))
}
