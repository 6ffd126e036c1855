//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::{Currency, Money};
use domain_payments::{Booking, BookingStatus, Payment, PaymentStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values are equal in amount and currency
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Money amounts differ: actual={}, expected={}",
        actual.amount(),
        expected.amount()
    );
}

/// Asserts that a Money value is a BDT amount equal to `expected`
pub fn assert_bdt(actual: &Money, expected: Decimal) {
    assert_money_eq(actual, &Money::new(expected, Currency::BDT));
}

/// Asserts that a booking's status agrees with its amounts
pub fn assert_booking_consistent(booking: &Booking) {
    assert!(
        booking.is_consistent(),
        "Booking {} is inconsistent: status={}, paid={}, due={}, paid_at={:?}",
        booking.id,
        booking.status.as_str(),
        booking.amount_paid,
        booking.amount_due,
        booking.paid_at
    );
}

/// Asserts a booking's status and paid amount in one go
pub fn assert_booking_state(booking: &Booking, status: BookingStatus, paid: Decimal) {
    assert_eq!(
        booking.status, status,
        "Booking {} has status {}, expected {}",
        booking.id,
        booking.status.as_str(),
        status.as_str()
    );
    assert_bdt(&booking.amount_paid, paid);
    assert_booking_consistent(booking);
}

/// Asserts that the booking's paid amount is exactly the sum of its
/// successful payments
pub fn assert_amount_conserved(booking: &Booking, payments: &[Payment]) {
    let settled = payments
        .iter()
        .filter(|p| p.booking_id == booking.id && p.status == PaymentStatus::Success)
        .fold(Money::zero(booking.currency()), |acc, p| {
            acc.checked_add(&p.amount).expect("Currency mismatch in sum")
        });

    assert_eq!(
        settled.amount(),
        booking.amount_paid.amount(),
        "Successful payments sum to {} but booking {} records {} paid",
        settled.amount(),
        booking.id,
        booking.amount_paid.amount()
    );
}

/// Asserts that a settled payment carries its verification metadata
pub fn assert_settled(payment: &Payment) {
    assert_eq!(
        payment.status,
        PaymentStatus::Success,
        "Payment {} is {}, expected success",
        payment.id,
        payment.status
    );
    assert!(
        payment.transaction_id.is_some(),
        "Settled payment {} has no transaction id",
        payment.id
    );
    assert!(
        payment.verified_at.is_some(),
        "Settled payment {} has no verification time",
        payment.id
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: {:?}", $msg, value),
            Err(e) => e,
        }
    };
}
