//! allocation.rs
//!
//! Автоматический подбор мест. Чистая функция от снимка: ничего не пишет,
//! поэтому результат нужно коммитить условным обновлением и при конфликте
//! пересчитывать по свежему снимку.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::Seat;

/// Выбирает `count` мест:
/// 1. первый (по номеру) ряд, где свободно не меньше `count` мест, и его первые `count` свободных мест;
/// 2. иначе первые `count` свободных мест вагона по возрастанию номера, без учёта рядов.
///
/// Идентификаторы возвращаются по возрастанию номера места.
pub fn allocate(snapshot: &[Seat], count: usize) -> Result<Vec<Uuid>, BookingError> {
    let mut free: Vec<&Seat> = snapshot.iter().filter(|s| s.is_free()).collect();
    free.sort_by_key(|s| s.seat_number);

    if free.len() < count {
        return Err(BookingError::InsufficientCapacity {
            requested: count,
            available: free.len(),
        });
    }

    let mut rows: BTreeMap<i32, Vec<&Seat>> = BTreeMap::new();
    for &seat in &free {
        rows.entry(seat.row_number).or_default().push(seat);
    }

    // BTreeMap итерируется по возрастанию номера ряда - первый подходящий и есть самый низкий
    if let Some((row, seats)) = rows.iter().find(|(_, seats)| seats.len() >= count) {
        tracing::debug!(row = *row, count, "allocated seats within a single row");
        return Ok(seats.iter().take(count).map(|s| s.id).collect());
    }

    tracing::debug!(count, "no row has enough free seats, falling back to first free seats");
    Ok(free.iter().take(count).map(|s| s.id).collect())
}
