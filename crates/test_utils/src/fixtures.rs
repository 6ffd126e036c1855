//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the payments
//! system. These fixtures are designed to be consistent and predictable for
//! unit tests.

use core_kernel::{BookingId, Currency, Money, ParticipantId, PaymentId, TourId, UserId};
use domain_payments::{Actor, Contact};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Creates a BDT amount
    pub fn bdt(amount: Decimal) -> Money {
        Money::new(amount, Currency::BDT)
    }

    /// Standard per-person tour cost
    pub fn tour_cost() -> Money {
        Money::new(dec!(5000.00), Currency::BDT)
    }

    /// Creates a standard BDT amount for testing
    pub fn bdt_100() -> Money {
        Money::new(dec!(100.00), Currency::BDT)
    }

    /// Creates a zero amount
    pub fn bdt_zero() -> Money {
        Money::zero(Currency::BDT)
    }

    /// Creates a USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn booking_id() -> BookingId {
        BookingId::new()
    }

    pub fn payment_id() -> PaymentId {
        PaymentId::new()
    }

    pub fn participant_id() -> ParticipantId {
        ParticipantId::new()
    }

    pub fn tour_id() -> TourId {
        TourId::new()
    }

    pub fn user_id() -> UserId {
        UserId::new()
    }
}

/// Fixture for the people acting on a booking
pub struct ActorFixtures;

impl ActorFixtures {
    /// An administrator unrelated to any tour
    pub fn admin() -> Actor {
        Actor::Admin(UserId::new())
    }

    /// An organizer who runs none of the seeded tours
    pub fn stranger_organizer() -> Actor {
        Actor::Organizer(UserId::new())
    }

    /// A tourist who joined none of the seeded tours
    pub fn stranger_tourist() -> Actor {
        Actor::Tourist(UserId::new())
    }

    pub fn guide() -> Actor {
        Actor::Guide(UserId::new())
    }
}

/// Fixture for contact details sent to the gateway
pub struct ContactFixtures;

impl ContactFixtures {
    pub fn tourist() -> Contact {
        Contact {
            name: "Rahim Uddin".to_string(),
            email: "rahim@example.com".to_string(),
            phone: Some("01711111111".to_string()),
        }
    }

    /// A tourist who never entered a phone number
    pub fn without_phone() -> Contact {
        Contact {
            name: "Karim Ahmed".to_string(),
            email: "karim@example.com".to_string(),
            phone: None,
        }
    }
}
