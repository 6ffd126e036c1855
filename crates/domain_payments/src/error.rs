//! Payments domain errors

use core_kernel::{MoneyError, PortError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::payment::PaymentStatus;

/// Errors that can occur in the payments domain
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Request data failed validation before anything was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// A contribution or payment amount that is zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Manual verification attempted before the due amount was collected
    #[error("Insufficient payment: paid {paid} of {due}")]
    InsufficientPayment {
        paid: Decimal,
        due: Decimal,
    },

    /// The booking or payment is already verified
    #[error("Already verified: {0}")]
    AlreadyVerified(String),

    /// The payment has already been settled
    #[error("Already settled: {0}")]
    AlreadySettled(String),

    /// The actor lacks the capability for this operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Booking not found
    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// Payment not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Tour participation not found
    #[error("Participation not found: {0}")]
    ParticipationNotFound(String),

    /// The payment state machine rejected a transition
    #[error("Invalid transition: payment cannot move from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Opening a gateway session failed
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Server-side validation of a notification could not be completed
    #[error("Gateway validation failed: {0}")]
    GatewayValidation(String),

    /// The ledger store failed
    #[error("Storage error: {0}")]
    Storage(PortError),
}

/// Coarse classification used to pick an HTTP status or a retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Permission,
    NotFound,
    AlreadySettled,
    Gateway,
    Internal,
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        PaymentError::PermissionDenied(message.into())
    }

    /// Returns the error's classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Validation(_)
            | PaymentError::InvalidAmount(_)
            | PaymentError::InsufficientPayment { .. }
            | PaymentError::InvalidTransition { .. } => ErrorKind::Validation,
            PaymentError::AlreadyVerified(_) | PaymentError::AlreadySettled(_) => {
                ErrorKind::AlreadySettled
            }
            PaymentError::PermissionDenied(_) => ErrorKind::Permission,
            PaymentError::BookingNotFound(_)
            | PaymentError::PaymentNotFound(_)
            | PaymentError::ParticipationNotFound(_) => ErrorKind::NotFound,
            PaymentError::GatewayUnavailable(_) | PaymentError::GatewayValidation(_) => {
                ErrorKind::Gateway
            }
            PaymentError::Storage(err) if err.is_not_found() => ErrorKind::NotFound,
            PaymentError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller should retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::GatewayValidation(_) => true,
            PaymentError::Storage(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<PortError> for PaymentError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => match entity_type.as_str() {
                "Booking" => PaymentError::BookingNotFound(id),
                "Payment" => PaymentError::PaymentNotFound(id),
                "Participation" => PaymentError::ParticipationNotFound(id),
                _ => PaymentError::Storage(PortError::NotFound { entity_type, id }),
            },
            PortError::Conflict { message } => PaymentError::AlreadySettled(message),
            PortError::Validation { message, .. } => PaymentError::Validation(message),
            other => PaymentError::Storage(other),
        }
    }
}

impl From<MoneyError> for PaymentError {
    fn from(err: MoneyError) -> Self {
        PaymentError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_entity_variant() {
        let err: PaymentError = PortError::not_found("Payment", "PAY-1").into();
        assert!(matches!(err, PaymentError::PaymentNotFound(ref id) if id == "PAY-1"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_conflict_maps_to_already_settled() {
        let err: PaymentError = PortError::conflict("duplicate transaction id").into();
        assert_eq!(err.kind(), ErrorKind::AlreadySettled);
    }

    #[test]
    fn test_retryable() {
        assert!(PaymentError::GatewayValidation("timeout".into()).is_retryable());
        assert!(PaymentError::Storage(PortError::connection("reset")).is_retryable());
        assert!(!PaymentError::GatewayUnavailable("refused".into()).is_retryable());
    }

    #[test]
    fn test_currency_mismatch_is_validation() {
        let err: PaymentError = MoneyError::CurrencyMismatch("BDT".into(), "USD".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
