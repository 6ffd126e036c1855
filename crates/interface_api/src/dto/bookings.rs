//! Booking DTOs

use chrono::{DateTime, Utc};
use core_kernel::Currency;
use domain_payments::{Booking, BookingStatement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::payments::PaymentResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct OpenBookingRequest {
    pub participant: Uuid,
    /// `online` (default) or `cash`
    #[validate(length(min = 1, max = 16))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub currency: Currency,
    pub status: String,
    pub payment_method: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<PaymentResponse>>,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            id: *booking.id.as_uuid(),
            participant_id: *booking.participant_id.as_uuid(),
            amount_due: booking.amount_due.amount(),
            amount_paid: booking.amount_paid.amount(),
            currency: booking.amount_due.currency(),
            status: booking.status.as_str().to_string(),
            payment_method: booking.payment_method.as_str().to_string(),
            paid_at: booking.paid_at,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            payments: None,
        }
    }
}

impl From<&BookingStatement> for BookingResponse {
    fn from(statement: &BookingStatement) -> Self {
        Self {
            payments: Some(statement.payments.iter().map(PaymentResponse::from).collect()),
            ..BookingResponse::from(&statement.booking)
        }
    }
}
