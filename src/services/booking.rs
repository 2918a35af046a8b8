//! booking.rs
//!
//! Координатор бронирования. Единственное место, которое меняет состояние мест.
//!
//! Гарантии:
//! - место не может быть забронировано дважды: запись идёт через
//!   `SeatStore::book_if_free`, условное обновление "только если ещё свободно";
//! - бронь из N мест либо проходит целиком, либо не оставляет следов;
//! - автоматическая бронь при конфликте один раз пересчитывается по свежему снимку;
//! - после каждого изменения сбрасывается кеш снимка мест.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::CacheService;
use crate::error::BookingError;
use crate::models::{Seat, SeatSlot, SeatStats};
use crate::services::allocation;
use crate::store::SeatStore;

/// Жёсткий предел мест в одной брони.
pub const MAX_SEATS_PER_BOOKING: usize = 7;

/// Сколько раз автоматическая бронь пробует закоммитить решение.
const AUTO_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingRequest {
    Manual(Vec<Uuid>),
    Auto(usize),
}

#[derive(Clone)]
pub struct BookingCoordinator {
    seats: Arc<dyn SeatStore>,
    cache: CacheService,
}

impl BookingCoordinator {
    pub fn new(seats: Arc<dyn SeatStore>) -> Self {
        Self::with_cache(seats, CacheService::disabled())
    }

    pub fn with_cache(seats: Arc<dyn SeatStore>, cache: CacheService) -> Self {
        Self { seats, cache }
    }

    /// Посев мест раскладки. Повторный вызов ничего не добавляет.
    pub async fn initialize(&self) -> Result<u64, BookingError> {
        let inserted = self.seats.seed(&SeatSlot::layout()).await?;
        if inserted > 0 {
            info!("{} seats initialized", inserted);
        }
        Ok(inserted)
    }

    pub async fn book(&self, requester_id: Uuid, request: BookingRequest) -> Result<Vec<Seat>, BookingError> {
        match request {
            BookingRequest::Manual(seat_ids) => {
                // предел считается по запросу как есть, повторы схлопываются уже после
                check_size(seat_ids.len())?;
                let mut seen = HashSet::new();
                let seat_ids: Vec<Uuid> = seat_ids.into_iter().filter(|id| seen.insert(*id)).collect();
                self.book_manual(requester_id, &seat_ids).await
            }
            BookingRequest::Auto(count) => {
                check_size(count)?;
                self.book_auto(requester_id, count).await
            }
        }
    }

    async fn book_manual(&self, requester_id: Uuid, seat_ids: &[Uuid]) -> Result<Vec<Seat>, BookingError> {
        match self.seats.book_if_free(seat_ids, requester_id).await? {
            Some(booked) => {
                info!(user_id = %requester_id, seats = ?seat_numbers(&booked), "manual booking committed");
                self.seats_changed().await;
                Ok(booked)
            }
            None => {
                warn!(user_id = %requester_id, requested = seat_ids.len(), "manual booking conflict");
                Err(BookingError::SeatConflict)
            }
        }
    }

    async fn book_auto(&self, requester_id: Uuid, count: usize) -> Result<Vec<Seat>, BookingError> {
        for attempt in 1..=AUTO_ATTEMPTS {
            // Каждая попытка решает заново по свежему снимку
            let snapshot = self.seats.list_all().await?;
            let candidates = allocation::allocate(&snapshot, count)?;

            if let Some(booked) = self.seats.book_if_free(&candidates, requester_id).await? {
                info!(
                    user_id = %requester_id,
                    attempt,
                    seats = ?seat_numbers(&booked),
                    "auto booking committed"
                );
                self.seats_changed().await;
                return Ok(booked);
            }

            warn!(user_id = %requester_id, attempt, count, "auto booking lost a race, seats taken concurrently");
        }

        Err(BookingError::SeatConflict)
    }

    pub async fn release(&self, requester_id: Uuid) -> Result<u64, BookingError> {
        let released = self.seats.release_owned(requester_id).await?;
        info!(user_id = %requester_id, released, "seats released");
        if released > 0 {
            self.seats_changed().await;
        }
        Ok(released)
    }

    pub async fn list_owned(&self, requester_id: Uuid) -> Result<Vec<Seat>, BookingError> {
        Ok(self.seats.list_owned(requester_id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Seat>, BookingError> {
        Ok(self.seats.list_all().await?)
    }

    pub async fn stats(&self) -> Result<SeatStats, BookingError> {
        let snapshot = self.seats.list_all().await?;
        Ok(SeatStats::from_snapshot(&snapshot))
    }

    /// Административный сброс: освобождает все места.
    pub async fn reset_all(&self) -> Result<u64, BookingError> {
        let released = self.seats.release_all().await?;
        warn!(released, "RESET: all seats released");
        self.seats_changed().await;
        Ok(released)
    }

    // Инвалидация идёт отдельной задачей: она доработает, даже если запрос оборвали после коммита
    async fn seats_changed(&self) {
        if !self.cache.is_enabled() {
            return;
        }
        let cache = self.cache.clone();
        if let Err(e) = tokio::spawn(async move { cache.invalidate_seats().await }).await {
            warn!("Seats cache invalidation task failed: {:?}", e);
        }
    }
}

fn check_size(size: usize) -> Result<(), BookingError> {
    if (1..=MAX_SEATS_PER_BOOKING).contains(&size) {
        Ok(())
    } else {
        Err(BookingError::InvalidRequestSize { got: size, max: MAX_SEATS_PER_BOOKING })
    }
}

fn seat_numbers(seats: &[Seat]) -> Vec<i32> {
    seats.iter().map(|s| s.seat_number).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Seat;
    use crate::store::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn coordinator() -> BookingCoordinator {
        let coordinator = BookingCoordinator::new(Arc::new(MemoryStore::new()));
        coordinator.initialize().await.unwrap();
        coordinator
    }

    fn numbers(seats: &[Seat]) -> Vec<i32> {
        seats.iter().map(|s| s.seat_number).collect()
    }

    #[tokio::test]
    async fn auto_booking_on_fresh_coach_takes_first_row() {
        for n in 1..=7 {
            let coordinator = coordinator().await;
            let booked = coordinator.book(Uuid::new_v4(), BookingRequest::Auto(n)).await.unwrap();
            assert_eq!(numbers(&booked), (1..=n as i32).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn auto_booking_moves_to_next_row_after_first_is_full() {
        let coordinator = coordinator().await;
        let first = coordinator.book(Uuid::new_v4(), BookingRequest::Auto(7)).await.unwrap();
        assert_eq!(numbers(&first), (1..=7).collect::<Vec<_>>());

        let second = coordinator.book(Uuid::new_v4(), BookingRequest::Auto(3)).await.unwrap();
        assert_eq!(numbers(&second), vec![8, 9, 10]);
    }

    #[tokio::test]
    async fn request_size_is_checked_before_storage() {
        let coordinator = coordinator().await;
        let user = Uuid::new_v4();

        for request in [BookingRequest::Auto(0), BookingRequest::Auto(8), BookingRequest::Manual(vec![])] {
            let err = coordinator.book(user, request).await.unwrap_err();
            assert!(matches!(err, BookingError::InvalidRequestSize { .. }));
        }

        let eight: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let err = coordinator.book(user, BookingRequest::Manual(eight)).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequestSize { got: 8, max: 7 }));
        assert!(coordinator.list_owned(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_manual_ids_count_once() {
        let coordinator = coordinator().await;
        let seat = coordinator.list_all().await.unwrap()[4].clone();
        let booked = coordinator
            .book(Uuid::new_v4(), BookingRequest::Manual(vec![seat.id, seat.id]))
            .await
            .unwrap();
        assert_eq!(numbers(&booked), vec![5]);
    }

    #[tokio::test]
    async fn repeated_ids_still_count_toward_the_limit() {
        let coordinator = coordinator().await;
        let user = Uuid::new_v4();
        let seat = coordinator.list_all().await.unwrap()[0].clone();

        let err = coordinator
            .book(user, BookingRequest::Manual(vec![seat.id; 8]))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequestSize { got: 8, max: 7 }));
        assert!(coordinator.list_all().await.unwrap()[0].is_free());
    }

    #[tokio::test]
    async fn manual_conflict_leaves_other_seats_free() {
        let coordinator = coordinator().await;
        let seats = coordinator.list_all().await.unwrap();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        coordinator.book(alice, BookingRequest::Manual(vec![seats[2].id])).await.unwrap();

        let err = coordinator
            .book(bob, BookingRequest::Manual(vec![seats[1].id, seats[2].id, seats[3].id]))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SeatConflict));
        assert!(coordinator.list_owned(bob).await.unwrap().is_empty());

        let after = coordinator.list_all().await.unwrap();
        assert!(after[1].is_free());
        assert!(after[3].is_free());
    }

    #[tokio::test]
    async fn falls_back_to_global_order() {
        let coordinator = coordinator().await;
        let seats = coordinator.list_all().await.unwrap();
        let blocker = Uuid::new_v4();

        // оставляем свободными только по два места в каждом ряду
        let taken: Vec<Uuid> = seats
            .iter()
            .filter(|s| if s.row_number == 12 { s.seat_number == 80 } else { (s.seat_number - 1) % 7 < 5 })
            .map(|s| s.id)
            .collect();
        for chunk in taken.chunks(MAX_SEATS_PER_BOOKING) {
            coordinator.book(blocker, BookingRequest::Manual(chunk.to_vec())).await.unwrap();
        }

        let booked = coordinator.book(Uuid::new_v4(), BookingRequest::Auto(5)).await.unwrap();
        assert_eq!(numbers(&booked), vec![6, 7, 13, 14, 20]);
    }

    #[tokio::test]
    async fn insufficient_capacity_when_coach_is_nearly_full() {
        let coordinator = coordinator().await;
        let seats = coordinator.list_all().await.unwrap();
        let blocker = Uuid::new_v4();
        let taken: Vec<Uuid> = seats.iter().take(78).map(|s| s.id).collect();
        for chunk in taken.chunks(MAX_SEATS_PER_BOOKING) {
            coordinator.book(blocker, BookingRequest::Manual(chunk.to_vec())).await.unwrap();
        }

        let err = coordinator.book(Uuid::new_v4(), BookingRequest::Auto(3)).await.unwrap_err();
        assert!(matches!(err, BookingError::InsufficientCapacity { requested: 3, available: 2 }));
    }

    #[tokio::test]
    async fn released_seats_are_immediately_bookable_by_others() {
        let coordinator = coordinator().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let mine = coordinator.book(alice, BookingRequest::Auto(4)).await.unwrap();
        assert_eq!(coordinator.release(alice).await.unwrap(), 4);

        let theirs = coordinator.book(bob, BookingRequest::Auto(4)).await.unwrap();
        assert_eq!(numbers(&mine), numbers(&theirs));
        assert!(theirs.iter().all(|s| s.owner_id == Some(bob)));
    }

    #[tokio::test]
    async fn release_without_seats_is_a_noop() {
        let coordinator = coordinator().await;
        assert_eq!(coordinator.release(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let coordinator = coordinator().await;
        assert_eq!(coordinator.initialize().await.unwrap(), 0);
        assert_eq!(coordinator.list_all().await.unwrap().len(), 80);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_overlapping_manual_bookings_have_one_winner() {
        let coordinator = coordinator().await;
        let seats = coordinator.list_all().await.unwrap();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let a = vec![seats[0].id, seats[1].id, seats[2].id];
        let b = vec![seats[2].id, seats[3].id];

        let (ra, rb) = tokio::join!(
            {
                let c = coordinator.clone();
                tokio::spawn(async move { c.book(alice, BookingRequest::Manual(a)).await })
            },
            {
                let c = coordinator.clone();
                tokio::spawn(async move { c.book(bob, BookingRequest::Manual(b)).await })
            }
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert!(ra.is_ok() ^ rb.is_ok(), "exactly one booking must win");
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser, Err(BookingError::SeatConflict)));

        let contested = coordinator.list_all().await.unwrap()[2].clone();
        assert!(contested.owner_id == Some(alice) || contested.owner_id == Some(bob));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_auto_bookings_never_share_seats() {
        let coordinator = coordinator().await;
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.book(Uuid::new_v4(), BookingRequest::Auto(7)).await })
            })
            .collect();

        let mut owned = 0;
        for handle in futures::future::join_all(handles).await {
            match handle.unwrap() {
                Ok(seats) => owned += seats.len(),
                Err(BookingError::SeatConflict) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }

        let snapshot = coordinator.list_all().await.unwrap();
        let booked = snapshot.iter().filter(|s| s.is_booked).count();
        assert_eq!(booked, owned);
        assert!(snapshot.iter().all(|s| s.is_booked == s.owner_id.is_some()));
    }

    /// Хранилище, которое перед первым коммитом "отдаёт" кандидатов другому пользователю.
    struct RacingStore {
        inner: MemoryStore,
        intruder: Uuid,
        races_left: AtomicUsize,
    }

    #[async_trait]
    impl SeatStore for RacingStore {
        async fn seed(&self, layout: &[SeatSlot]) -> StoreResult<u64> {
            self.inner.seed(layout).await
        }
        async fn list_all(&self) -> StoreResult<Vec<Seat>> {
            self.inner.list_all().await
        }
        async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<Seat>> {
            self.inner.list_owned(owner_id).await
        }
        async fn book_if_free(&self, seat_ids: &[Uuid], owner_id: Uuid) -> StoreResult<Option<Vec<Seat>>> {
            let race = self
                .races_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if race {
                self.inner.book_if_free(&seat_ids[..1], self.intruder).await?;
            }
            self.inner.book_if_free(seat_ids, owner_id).await
        }
        async fn release_owned(&self, owner_id: Uuid) -> StoreResult<u64> {
            self.inner.release_owned(owner_id).await
        }
        async fn release_all(&self) -> StoreResult<u64> {
            self.inner.release_all().await
        }
    }

    async fn racing(races: usize) -> (BookingCoordinator, Uuid) {
        let intruder = Uuid::new_v4();
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            intruder,
            races_left: AtomicUsize::new(races),
        });
        let coordinator = BookingCoordinator::new(store);
        coordinator.initialize().await.unwrap();
        (coordinator, intruder)
    }

    #[tokio::test]
    async fn auto_booking_retries_once_against_fresh_snapshot() {
        let (coordinator, intruder) = racing(1).await;
        let user = Uuid::new_v4();

        let booked = coordinator.book(user, BookingRequest::Auto(3)).await.unwrap();
        // место 1 ушло конкуренту, повтор берёт 2..4 из того же ряда
        assert_eq!(numbers(&booked), vec![2, 3, 4]);
        assert_eq!(numbers(&coordinator.list_owned(intruder).await.unwrap()), vec![1]);
    }

    #[tokio::test]
    async fn auto_booking_gives_up_after_second_conflict() {
        let (coordinator, _) = racing(2).await;
        let user = Uuid::new_v4();

        let err = coordinator.book(user, BookingRequest::Auto(3)).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatConflict));
        assert!(coordinator.list_owned(user).await.unwrap().is_empty());
    }
}
