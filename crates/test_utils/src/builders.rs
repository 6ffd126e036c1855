//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;

use core_kernel::{BookingId, Money, ParticipantId, TourId, UserId};
use domain_payments::{
    Booking, BookingChannel, BookingStatus, Contact, Participation, ParticipationStatus, Payment,
    PaymentStatus,
};

use crate::fixtures::MoneyFixtures;

/// Builder for tour participations
pub struct ParticipationBuilder {
    id: ParticipantId,
    tour_id: TourId,
    tourist_id: UserId,
    organizer_id: UserId,
    status: ParticipationStatus,
    cost_per_person: Money,
    contact: Option<Contact>,
}

impl Default for ParticipationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipationBuilder {
    /// Creates an approved participation on a fresh tour
    pub fn new() -> Self {
        Self {
            id: ParticipantId::new(),
            tour_id: TourId::new(),
            tourist_id: UserId::new(),
            organizer_id: UserId::new(),
            status: ParticipationStatus::Approved,
            cost_per_person: MoneyFixtures::tour_cost(),
            contact: None,
        }
    }

    pub fn with_tourist(mut self, id: UserId) -> Self {
        self.tourist_id = id;
        self
    }

    pub fn with_organizer(mut self, id: UserId) -> Self {
        self.organizer_id = id;
        self
    }

    pub fn with_status(mut self, status: ParticipationStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the seat price, which becomes the booking's due amount
    pub fn with_cost(mut self, cost: Money) -> Self {
        self.cost_per_person = cost;
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Builds the participation, inventing contact details if none were set
    pub fn build(self) -> Participation {
        let tourist_contact = self.contact.unwrap_or_else(|| Contact {
            name: Name().fake(),
            email: SafeEmail().fake(),
            phone: None,
        });

        Participation {
            id: self.id,
            tour_id: self.tour_id,
            tourist_id: self.tourist_id,
            organizer_id: self.organizer_id,
            status: self.status,
            cost_per_person: self.cost_per_person,
            tourist_contact,
        }
    }
}

/// Builder for bookings in an arbitrary state
///
/// `build` does not re-derive the status, so inconsistent rows can be
/// constructed on purpose.
pub struct BookingBuilder {
    booking: Booking,
}

impl BookingBuilder {
    /// Starts from a freshly opened online booking for `participation`
    pub fn for_participation(participation: &Participation) -> Self {
        Self {
            booking: Booking::open(participation, BookingChannel::Online),
        }
    }

    pub fn with_channel(mut self, channel: BookingChannel) -> Self {
        self.booking.payment_method = channel;
        self
    }

    /// Sets the paid amount and the status it implies
    pub fn with_paid(mut self, paid: Money) -> Self {
        self.booking.amount_paid = paid;
        self.booking.status = Booking::derive_status(&self.booking.amount_due, &paid);
        if self.booking.status == BookingStatus::Paid {
            self.booking.paid_at = Some(chrono::Utc::now());
        }
        self
    }

    /// Overrides the status without touching the amounts
    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.booking.status = status;
        self
    }

    pub fn build(self) -> Booking {
        self.booking
    }
}

/// Builder for payments against a booking
pub struct PaymentBuilder {
    payment: Payment,
}

impl PaymentBuilder {
    /// Starts from a `Processing` gateway payment
    pub fn gateway(booking_id: BookingId, amount: Money) -> Self {
        let mut payment = Payment::new_gateway(booking_id, amount, UserId::new());
        payment.transaction_id = Some(payment.gateway_reference());
        Self { payment }
    }

    /// Starts from a settled cash payment
    pub fn cash(booking_id: BookingId, amount: Money) -> Self {
        Self {
            payment: Payment::new_cash(booking_id, amount, UserId::new()),
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.payment.status = status;
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: Option<&str>) -> Self {
        self.payment.transaction_id = transaction_id.map(str::to_string);
        self
    }

    pub fn with_created_by(mut self, user: UserId) -> Self {
        self.payment.created_by = user;
        self
    }

    pub fn build(self) -> Payment {
        self.payment
    }
}
