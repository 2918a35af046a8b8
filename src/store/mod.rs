//! Хранилища мест и пользователей.
//!
//! Все изменения мест - условные обновления: место бронируется только если
//! оно всё ещё свободно, освобождается только если всё ещё принадлежит
//! запросившему. Чтение-затем-безусловная-запись здесь не используется.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Seat, SeatSlot, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Duplicate,
    #[error("seat owner does not exist")]
    UnknownOwner,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Создаёт недостающие места раскладки. Существующие записи не трогает,
    /// возвращает число реально вставленных.
    async fn seed(&self, layout: &[SeatSlot]) -> StoreResult<u64>;

    /// Снимок всех мест по возрастанию номера.
    async fn list_all(&self) -> StoreResult<Vec<Seat>>;

    async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<Seat>>;

    /// Атомарно бронирует все места для `owner_id`, если каждое из них ещё
    /// свободно. `None` - хотя бы одно занято или не существует, ничего не записано.
    async fn book_if_free(&self, seat_ids: &[Uuid], owner_id: Uuid) -> StoreResult<Option<Vec<Seat>>>;

    /// Освобождает места, которые на момент записи принадлежат `owner_id`.
    async fn release_owned(&self, owner_id: Uuid) -> StoreResult<u64>;

    async fn release_all(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `StoreError::Duplicate`, если имя уже занято.
    async fn insert_user(&self, username: &str, password_hash: &str) -> StoreResult<User>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
}
