//! Core Kernel - Foundational types for the tour payments system
//!
//! This crate provides the fundamental building blocks used across all
//! payment modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers for bookings, payments and their collaborators
//! - Port abstractions shared by storage and gateway adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{BookingId, PaymentId, ParticipantId, TourId, UserId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    CircuitBreakerConfig,
};
