use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Фиксированная раскладка вагона: 11 рядов по 7 мест и последний ряд из 3.
pub const TOTAL_SEATS: i32 = 80;
pub const SEATS_PER_ROW: i32 = 7;
pub const ROW_COUNT: i32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: Uuid,
    pub seat_number: i32,
    pub row_number: i32,
    pub is_booked: bool,
    pub owner_id: Option<Uuid>,
}

impl Seat {
    pub fn is_free(&self) -> bool {
        !self.is_booked
    }
}

/// Позиция места в раскладке, без состояния брони. Используется при посеве.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatSlot {
    pub seat_number: i32,
    pub row_number: i32,
}

impl SeatSlot {
    pub fn layout() -> Vec<SeatSlot> {
        (1..=TOTAL_SEATS)
            .map(|seat_number| SeatSlot {
                seat_number,
                row_number: (seat_number - 1) / SEATS_PER_ROW + 1,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowStats {
    pub row_number: i32,
    pub total: usize,
    pub free: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatStats {
    pub total: usize,
    pub booked: usize,
    pub free: usize,
    pub rows: Vec<RowStats>,
}

impl SeatStats {
    pub fn from_snapshot(seats: &[Seat]) -> Self {
        let mut rows: Vec<RowStats> = Vec::new();
        for seat in seats {
            let idx = match rows.iter().position(|r| r.row_number == seat.row_number) {
                Some(idx) => idx,
                None => {
                    rows.push(RowStats { row_number: seat.row_number, total: 0, free: 0 });
                    rows.len() - 1
                }
            };
            rows[idx].total += 1;
            if seat.is_free() {
                rows[idx].free += 1;
            }
        }
        rows.sort_by_key(|r| r.row_number);

        let free = seats.iter().filter(|s| s.is_free()).count();
        SeatStats {
            total: seats.len(),
            booked: seats.len() - free,
            free,
            rows,
        }
    }
}
