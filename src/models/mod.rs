pub mod user;
pub mod seat;

pub use user::User;
pub use seat::{Seat, SeatSlot, SeatStats, RowStats};
