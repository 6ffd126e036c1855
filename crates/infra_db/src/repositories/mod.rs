//! Repository implementations for ledger entities
//!
//! Each repository maps between database rows and domain types. Queries
//! are built at runtime with `sqlx::query_as` and `FromRow` rows, so the
//! crate builds without a live database.
//!
//! Methods that take a `PgConnection` are meant to run on the connection of
//! an open transaction; the ones on `&self` read through the pool.

pub mod bookings;
pub mod participations;
pub mod payments;

pub use bookings::{BookingRepository, BookingRow};
pub use participations::{ParticipationRepository, ParticipationRow};
pub use payments::{PaymentRepository, PaymentRow};
