pub mod allocation;
pub mod auth;
pub mod booking;
