//! Payment ledger entries
//!
//! A payment is one attempt to contribute money toward a booking. It moves
//! through a small state machine and, once `Success`, its amount and
//! transaction id are frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BookingId, Money, PaymentId, UserId};

use crate::error::PaymentError;

/// How the money is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Online checkout through the payment gateway
    #[serde(alias = "sslcommerz")]
    Gateway,
    /// Cash collected in person by the organizer
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gateway" | "sslcommerz" => Some(PaymentMethod::Gateway),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }
}

/// Payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initiated,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "initiated",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initiated" => Some(PaymentStatus::Initiated),
            "processing" => Some(PaymentStatus::Processing),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true for `Success`, `Failed` and `Cancelled`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Success | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Transitions allowed on the automatic paths
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Initiated, Processing)
                | (Initiated, Success)
                | (Initiated, Failed)
                | (Initiated, Cancelled)
                | (Processing, Success)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    /// Fixed at creation
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// External reference; unique among settled payments
    pub transaction_id: Option<String>,
    /// Last raw gateway response or notification, kept for audit
    pub gateway_payload: Option<serde_json::Value>,
    pub created_by: UserId,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a gateway payment awaiting its checkout outcome
    pub fn new_gateway(booking_id: BookingId, amount: Money, created_by: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new_v7(),
            booking_id,
            amount,
            method: PaymentMethod::Gateway,
            status: PaymentStatus::Processing,
            transaction_id: None,
            gateway_payload: None,
            created_by,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a cash payment that is settled on the spot by its collector
    pub fn new_cash(booking_id: BookingId, amount: Money, collected_by: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new_v7(),
            booking_id,
            amount,
            method: PaymentMethod::Cash,
            status: PaymentStatus::Success,
            transaction_id: Some(format!(
                "CASH-{}-{}",
                booking_id.as_uuid(),
                now.timestamp_micros()
            )),
            gateway_payload: None,
            created_by: collected_by,
            verified_by: Some(collected_by),
            verified_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == PaymentStatus::Success
    }

    /// Reference handed to the gateway and echoed back in its notifications
    pub fn gateway_reference(&self) -> String {
        self.id.to_string()
    }

    /// Moves to `next` if the state machine allows it
    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replaces the stored gateway payload
    pub fn record_payload(&mut self, payload: serde_json::Value) {
        self.gateway_payload = Some(payload);
        self.updated_at = Utc::now();
    }

    /// Fills in verification metadata that is still missing
    ///
    /// Returns true if anything changed.
    pub fn backfill_verification(&mut self, verified_by: Option<UserId>) -> bool {
        let mut changed = false;
        if self.verified_at.is_none() {
            self.verified_at = Some(Utc::now());
            changed = true;
        }
        if self.verified_by.is_none() && verified_by.is_some() {
            self.verified_by = verified_by;
            changed = true;
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}
