//! Payment DTOs

use chrono::{DateTime, Utc};
use core_kernel::Currency;
use domain_payments::{Payment, SessionResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::positive_amount;

#[derive(Debug, Deserialize, Validate)]
pub struct InitiatePaymentRequest {
    pub booking: Uuid,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    /// Defaults to the booking's currency as configured for the gateway
    pub currency: Option<Currency>,
    /// `gateway` or `sslcommerz`; cash cannot be initiated
    #[validate(length(min = 1, max = 32))]
    pub method: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CashPaymentRequest {
    pub booking: Uuid,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    pub currency: Option<Currency>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_payload: Option<serde_json::Value>,
    pub created_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: *payment.id.as_uuid(),
            booking_id: *payment.booking_id.as_uuid(),
            amount: payment.amount.amount(),
            currency: payment.amount.currency(),
            method: payment.method.as_str().to_string(),
            status: payment.status.as_str().to_string(),
            transaction_id: payment.transaction_id.clone(),
            gateway_payload: payment.gateway_payload.clone(),
            created_by: *payment.created_by.as_uuid(),
            verified_by: payment.verified_by.map(Uuid::from),
            verified_at: payment.verified_at,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GatewaySessionResponse {
    pub redirect_url: Option<String>,
    pub session_key: Option<String>,
}

impl From<&SessionResponse> for GatewaySessionResponse {
    fn from(session: &SessionResponse) -> Self {
        Self {
            redirect_url: session.redirect_url.clone(),
            session_key: session.session_key.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub payment_id: Uuid,
    pub gateway_session: GatewaySessionResponse,
    pub payment: PaymentResponse,
}

/// Acknowledgement sent back to the gateway for a notification
#[derive(Debug, Serialize)]
pub struct IpnResponse {
    /// `processed` or `already_processed`
    pub status: &'static str,
    pub payment_id: Uuid,
    pub payment_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_initiate_request_rejects_non_positive_amount() {
        let request = InitiatePaymentRequest {
            booking: Uuid::new_v4(),
            amount: dec!(0),
            currency: None,
            method: Some("sslcommerz".to_string()),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("amount"));
    }

    #[test]
    fn test_cash_request_parses_decimal_strings() {
        let request: CashPaymentRequest = serde_json::from_value(serde_json::json!({
            "booking": Uuid::new_v4(),
            "amount": "40.00",
        }))
        .unwrap();
        assert_eq!(request.amount, dec!(40.00));
        assert!(request.validate().is_ok());
    }
}
