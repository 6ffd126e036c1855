//! Request and response bodies

pub mod bookings;
pub mod payments;

use rust_decimal::Decimal;
use validator::ValidationError;

/// Rejects zero and negative amounts before they reach the engine
pub(crate) fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        let mut error = ValidationError::new("positive");
        error.message = Some("must be greater than zero".into());
        Err(error)
    }
}
