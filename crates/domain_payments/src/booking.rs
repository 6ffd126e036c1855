//! Booking aggregate
//!
//! A booking tracks how much of a participation's price has been collected.
//! Its status is never set directly: it is derived from `amount_paid` against
//! `amount_due` every time a contribution lands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BookingId, Currency, Money, ParticipantId};

use crate::error::PaymentError;
use crate::participation::Participation;

/// Payment status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Nothing collected yet
    Pending,
    /// Some, but not all, of the due amount collected
    Partial,
    /// Due amount collected in full
    Paid,
    /// Left behind by older flows; never derived, recoverable through manual verification
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Partial => "partial",
            BookingStatus::Paid => "paid",
            BookingStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BookingStatus::Pending),
            "partial" => Some(BookingStatus::Partial),
            "paid" => Some(BookingStatus::Paid),
            "failed" => Some(BookingStatus::Failed),
            _ => None,
        }
    }
}

/// How the tourist intends to pay; advisory only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingChannel {
    Cash,
    Online,
}

impl BookingChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingChannel::Cash => "cash",
            BookingChannel::Online => "online",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(BookingChannel::Cash),
            "online" => Some(BookingChannel::Online),
            _ => None,
        }
    }
}

/// A tourist's payable reservation for one tour participation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// Owning participation; at most one booking exists per participation
    pub participant_id: ParticipantId,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub status: BookingStatus,
    pub payment_method: BookingChannel,
    /// Set on the first transition into `Paid`
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Opens a booking priced from the participation's seat cost
    pub fn open(participation: &Participation, channel: BookingChannel) -> Self {
        let now = Utc::now();
        let due = participation.cost_per_person;

        Self {
            id: BookingId::new_v7(),
            participant_id: participation.id,
            amount_due: due,
            amount_paid: Money::zero(due.currency()),
            status: BookingStatus::Pending,
            payment_method: channel,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status implied by the paid and due amounts
    ///
    /// Amounts in different currencies never derive `Paid`.
    pub fn derive_status(amount_due: &Money, amount_paid: &Money) -> BookingStatus {
        if amount_paid.is_zero() || amount_paid.is_negative() {
            BookingStatus::Pending
        } else if amount_paid >= amount_due {
            BookingStatus::Paid
        } else {
            BookingStatus::Partial
        }
    }

    pub fn currency(&self) -> Currency {
        self.amount_due.currency()
    }

    /// Remaining amount to collect, never negative
    pub fn amount_outstanding(&self) -> Money {
        self.amount_due
            .checked_sub(&self.amount_paid)
            .map(|m| m.clamp_non_negative())
            .unwrap_or_else(|_| Money::zero(self.currency()))
    }

    pub fn is_paid(&self) -> bool {
        self.status == BookingStatus::Paid
    }

    pub fn is_overpaid(&self) -> bool {
        self.amount_paid > self.amount_due
    }

    /// Adds a settled contribution and re-derives the status
    ///
    /// Never rejects an amount for exceeding what is due; the cap is applied
    /// when payments are created.
    pub fn apply_contribution(&mut self, amount: Money) -> Result<BookingStatus, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount(format!(
                "contribution must be positive, got {}",
                amount
            )));
        }

        let paid = self.amount_paid.checked_add(&amount)?;
        let now = Utc::now();

        self.amount_paid = paid;
        self.status = Self::derive_status(&self.amount_due, &self.amount_paid);
        if self.status == BookingStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
        self.updated_at = now;

        Ok(self.status)
    }

    /// Marks the booking paid by hand once the due amount is covered
    pub fn manual_verify(&mut self) -> Result<BookingStatus, PaymentError> {
        if self.amount_paid < self.amount_due {
            return Err(PaymentError::InsufficientPayment {
                paid: self.amount_paid.amount(),
                due: self.amount_due.amount(),
            });
        }
        if self.status == BookingStatus::Paid {
            return Err(PaymentError::AlreadyVerified(format!(
                "booking {} is already paid",
                self.id
            )));
        }

        let now = Utc::now();
        self.status = BookingStatus::Paid;
        self.paid_at = Some(now);
        self.updated_at = now;

        Ok(self.status)
    }

    /// Checks that the stored status agrees with the amounts
    ///
    /// `Failed` rows are accepted as-is; they only leave that state through
    /// a contribution or manual verification.
    pub fn is_consistent(&self) -> bool {
        if self.amount_paid.is_negative() || self.amount_paid.currency() != self.currency() {
            return false;
        }
        match self.status {
            BookingStatus::Failed => true,
            status => {
                status == Self::derive_status(&self.amount_due, &self.amount_paid)
                    && (status != BookingStatus::Paid || self.paid_at.is_some())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participation::{Contact, ParticipationStatus};
    use core_kernel::{TourId, UserId};
    use rust_decimal_macros::dec;

    fn bdt(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::BDT)
    }

    fn booking(due: rust_decimal::Decimal) -> Booking {
        let participation = Participation {
            id: ParticipantId::new(),
            tour_id: TourId::new(),
            tourist_id: UserId::new(),
            organizer_id: UserId::new(),
            status: ParticipationStatus::Approved,
            cost_per_person: bdt(due),
            tourist_contact: Contact {
                name: "Karim".to_string(),
                email: "karim@example.com".to_string(),
                phone: Some("01700000000".to_string()),
            },
        };
        Booking::open(&participation, BookingChannel::Online)
    }

    #[test]
    fn test_open_is_pending_and_priced() {
        let b = booking(dec!(100.00));
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.amount_due, bdt(dec!(100)));
        assert!(b.amount_paid.is_zero());
        assert!(b.is_consistent());
    }

    #[test]
    fn test_partial_then_paid() {
        let mut b = booking(dec!(100.00));

        assert_eq!(b.apply_contribution(bdt(dec!(40.00))).unwrap(), BookingStatus::Partial);
        assert!(b.paid_at.is_none());

        assert_eq!(b.apply_contribution(bdt(dec!(60.00))).unwrap(), BookingStatus::Paid);
        assert!(b.paid_at.is_some());
        assert_eq!(b.amount_outstanding(), bdt(dec!(0)));
    }

    #[test]
    fn test_paid_at_is_set_once() {
        let mut b = booking(dec!(50.00));
        b.apply_contribution(bdt(dec!(50.00))).unwrap();
        let first = b.paid_at;
        b.apply_contribution(bdt(dec!(10.00))).unwrap();
        assert_eq!(b.paid_at, first);
        assert!(b.is_overpaid());
        assert_eq!(b.status, BookingStatus::Paid);
    }

    #[test]
    fn test_non_positive_contribution_rejected() {
        let mut b = booking(dec!(100.00));
        assert!(matches!(
            b.apply_contribution(bdt(dec!(0))),
            Err(PaymentError::InvalidAmount(_))
        ));
        assert!(matches!(
            b.apply_contribution(bdt(dec!(-5))),
            Err(PaymentError::InvalidAmount(_))
        ));
        assert!(b.amount_paid.is_zero());
    }

    #[test]
    fn test_foreign_currency_contribution_rejected() {
        let mut b = booking(dec!(100.00));
        let err = b
            .apply_contribution(Money::new(dec!(10), Currency::USD))
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn test_manual_verify_checks_insufficient_first() {
        let mut b = booking(dec!(100.00));
        b.apply_contribution(bdt(dec!(30))).unwrap();
        assert!(matches!(
            b.manual_verify(),
            Err(PaymentError::InsufficientPayment { .. })
        ));
    }

    #[test]
    fn test_manual_verify_on_paid_booking() {
        let mut b = booking(dec!(100.00));
        b.apply_contribution(bdt(dec!(100))).unwrap();
        assert!(matches!(b.manual_verify(), Err(PaymentError::AlreadyVerified(_))));
    }

    #[test]
    fn test_manual_verify_recovers_failed_booking() {
        let mut b = booking(dec!(100.00));
        b.amount_paid = bdt(dec!(100));
        b.status = BookingStatus::Failed;
        assert!(b.is_consistent());

        assert_eq!(b.manual_verify().unwrap(), BookingStatus::Paid);
        assert!(b.paid_at.is_some());
        assert!(b.is_consistent());
    }

    #[test]
    fn test_inconsistent_status_detected() {
        let mut b = booking(dec!(100.00));
        b.status = BookingStatus::Partial;
        assert!(!b.is_consistent());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::participation::{Contact, ParticipationStatus};
    use core_kernel::{TourId, UserId};
    use proptest::prelude::*;

    fn booking(due_minor: i64) -> Booking {
        let participation = Participation {
            id: ParticipantId::new(),
            tour_id: TourId::new(),
            tourist_id: UserId::new(),
            organizer_id: UserId::new(),
            status: ParticipationStatus::Approved,
            cost_per_person: Money::from_minor(due_minor, Currency::BDT),
            tourist_contact: Contact {
                name: "Test".to_string(),
                email: "test@example.com".to_string(),
                phone: None,
            },
        };
        Booking::open(&participation, BookingChannel::Cash)
    }

    proptest! {
        #[test]
        fn status_always_matches_amounts(
            due in 1i64..10_000_000i64,
            contributions in prop::collection::vec(1i64..5_000_000i64, 0..12)
        ) {
            let mut b = booking(due);
            let mut total = Money::zero(Currency::BDT);

            for minor in contributions {
                let amount = Money::from_minor(minor, Currency::BDT);
                let before = b.amount_paid;
                b.apply_contribution(amount).unwrap();
                total = total.checked_add(&amount).unwrap();

                prop_assert!(b.amount_paid > before);
                prop_assert!(b.is_consistent());
            }

            prop_assert_eq!(b.amount_paid, total);
            let expected = if total.is_zero() {
                BookingStatus::Pending
            } else if total >= b.amount_due {
                BookingStatus::Paid
            } else {
                BookingStatus::Partial
            };
            prop_assert_eq!(b.status, expected);
        }
    }
}
