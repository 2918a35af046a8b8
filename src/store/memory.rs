use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Seat, SeatSlot, User};
use crate::store::{SeatStore, StoreError, StoreResult, UserStore};

/// In-memory хранилище для разработки без Postgres и для тестов.
/// Проверка и запись выполняются в одной критической секции.
#[derive(Clone, Default)]
pub struct MemoryStore {
    // seat_number -> место
    seats: Arc<Mutex<BTreeMap<i32, Seat>>>,
    users: Arc<Mutex<Vec<User>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeatStore for MemoryStore {
    async fn seed(&self, layout: &[SeatSlot]) -> StoreResult<u64> {
        let mut seats = self.seats.lock().await;
        let mut inserted = 0;
        for slot in layout {
            seats.entry(slot.seat_number).or_insert_with(|| {
                inserted += 1;
                Seat {
                    id: Uuid::new_v4(),
                    seat_number: slot.seat_number,
                    row_number: slot.row_number,
                    is_booked: false,
                    owner_id: None,
                }
            });
        }
        Ok(inserted)
    }

    async fn list_all(&self) -> StoreResult<Vec<Seat>> {
        Ok(self.seats.lock().await.values().cloned().collect())
    }

    async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<Seat>> {
        Ok(self
            .seats
            .lock()
            .await
            .values()
            .filter(|s| s.owner_id == Some(owner_id))
            .cloned()
            .collect())
    }

    async fn book_if_free(&self, seat_ids: &[Uuid], owner_id: Uuid) -> StoreResult<Option<Vec<Seat>>> {
        let mut seats = self.seats.lock().await;

        let targets: Vec<i32> = seats
            .values()
            .filter(|s| seat_ids.contains(&s.id) && s.is_free())
            .map(|s| s.seat_number)
            .collect();
        if targets.len() != seat_ids.len() {
            return Ok(None);
        }

        let mut booked = Vec::with_capacity(targets.len());
        for number in targets {
            if let Some(seat) = seats.get_mut(&number) {
                seat.is_booked = true;
                seat.owner_id = Some(owner_id);
                booked.push(seat.clone());
            }
        }
        Ok(Some(booked))
    }

    async fn release_owned(&self, owner_id: Uuid) -> StoreResult<u64> {
        let mut seats = self.seats.lock().await;
        let mut released = 0;
        for seat in seats.values_mut().filter(|s| s.owner_id == Some(owner_id)) {
            seat.is_booked = false;
            seat.owner_id = None;
            released += 1;
        }
        Ok(released)
    }

    async fn release_all(&self) -> StoreResult<u64> {
        let mut seats = self.seats.lock().await;
        let mut released = 0;
        for seat in seats.values_mut().filter(|s| s.is_booked) {
            seat.is_booked = false;
            seat.owner_id = None;
            released += 1;
        }
        Ok(released)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> StoreResult<User> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.username == username) {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.users.lock().await.iter().find(|u| u.username == username).cloned())
    }
}
