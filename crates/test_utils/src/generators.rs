//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Currency, Money};
use domain_payments::{BookingStatus, PaymentStatus};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating supported Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::BDT),
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::INR),
    ]
}

/// Strategy for positive amounts in paisa, up to one million taka
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive BDT amounts
pub fn bdt_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|minor| Money::from_minor(minor, Currency::BDT))
}

/// Strategy for a due amount with whole taka
pub fn due_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(Decimal::from)
}

/// Strategy for a sequence of contributions in paisa
///
/// Contributions are small relative to typical due amounts so sequences
/// cross the partial and paid boundaries.
pub fn contribution_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Money>> {
    prop::collection::vec(
        (1i64..2_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::BDT)),
        1..=max_len,
    )
}

/// Strategy for payment statuses
pub fn payment_status_strategy() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Initiated),
        Just(PaymentStatus::Processing),
        Just(PaymentStatus::Success),
        Just(PaymentStatus::Failed),
        Just(PaymentStatus::Cancelled),
    ]
}

/// Strategy for booking statuses
pub fn booking_status_strategy() -> impl Strategy<Value = BookingStatus> {
    prop_oneof![
        Just(BookingStatus::Pending),
        Just(BookingStatus::Partial),
        Just(BookingStatus::Paid),
        Just(BookingStatus::Failed),
    ]
}

/// Outcome a gateway delivery can claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Valid,
    Failed,
    Cancelled,
}

/// Strategy for the outcomes claimed by redirects and notifications
pub fn delivery_outcome_strategy() -> impl Strategy<Value = DeliveryOutcome> {
    prop_oneof![
        3 => Just(DeliveryOutcome::Valid),
        1 => Just(DeliveryOutcome::Failed),
        1 => Just(DeliveryOutcome::Cancelled),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_bdt_money_is_positive(money in bdt_money_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.currency(), Currency::BDT);
        }

        #[test]
        fn test_contribution_sequences_are_non_empty(seq in contribution_sequence_strategy(5)) {
            prop_assert!(!seq.is_empty());
            prop_assert!(seq.len() <= 5);
        }
    }
}
