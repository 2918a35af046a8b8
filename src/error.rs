use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::store::StoreError;

/// Ошибки, которые видит клиент. Каждая операция бронирования либо
/// завершается целиком, либо возвращает одну из них без частичных изменений.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("username is already taken")]
    UsernameTaken,

    #[error("authentication required")]
    Unauthenticated,

    #[error("a booking must contain between 1 and {max} seats, got {got}")]
    InvalidRequestSize { got: usize, max: usize },

    #[error("one or more requested seats are no longer available")]
    SeatConflict,

    #[error("requested {requested} seats but only {available} are free")]
    InsufficientCapacity { requested: usize, available: usize },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            BookingError::UsernameTaken => "USERNAME_TAKEN",
            BookingError::Unauthenticated => "UNAUTHENTICATED",
            BookingError::InvalidRequestSize { .. } => "INVALID_REQUEST_SIZE",
            BookingError::SeatConflict => "SEAT_CONFLICT",
            BookingError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            BookingError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BookingError::InvalidCredentials(_) | BookingError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            BookingError::UsernameTaken
            | BookingError::SeatConflict
            | BookingError::InsufficientCapacity { .. } => StatusCode::CONFLICT,
            BookingError::InvalidRequestSize { .. } => StatusCode::BAD_REQUEST,
            BookingError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            // токен подписан верно, но пользователя уже нет в базе
            StoreError::UnknownOwner => BookingError::Unauthenticated,
            other => BookingError::StorageUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Детали сбоя хранилища только в лог, клиенту общий текст
        let message = match &self {
            BookingError::StorageUnavailable(cause) => {
                tracing::error!(cause = %cause, "storage failure");
                "Storage is temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
