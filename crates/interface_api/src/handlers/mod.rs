//! Request handlers

pub mod bookings;
pub mod gateway;
pub mod health;
pub mod payments;
