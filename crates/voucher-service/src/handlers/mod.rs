//! API handlers.

pub mod coupons;
pub mod deposits;
pub mod health;
pub mod prices;
pub mod sales;
pub mod stock;
pub mod users;
