//! Payments Domain Ports
//!
//! This module defines the port interfaces the payments domain needs from the
//! outside world:
//!
//! - [`LedgerStore`] / [`LedgerTransaction`]: transactional storage for
//!   bookings and payments, with row locks for the settle path
//! - [`PaymentGateway`]: the external checkout and validation service
//!
//! # Adapters
//!
//! - **PostgreSQL**: `infra_db::PostgresLedgerStore` (`SELECT ... FOR UPDATE`)
//! - **In-memory**: [`crate::adapters::InMemoryLedgerStore`]
//! - **SSLCommerz**: [`crate::adapters::SslCommerzGateway`]
//! - **Scripted**: [`crate::adapters::ScriptedGateway`] for tests and local runs
//!
//! # Transactions
//!
//! A `LedgerTransaction` is the unit of atomicity. Writes become visible only
//! after [`LedgerTransaction::commit`]; dropping a transaction without
//! committing discards every write made through it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{
    BookingId, DomainPort, HealthCheckable, Money, ParticipantId, PaymentId, PortError,
};

use crate::booking::Booking;
use crate::participation::{Contact, Participation};
use crate::payment::Payment;

/// Storage for bookings and their payments
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Starts a new transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, PortError>;

    /// Reads a booking without locking it
    async fn get_booking(&self, id: BookingId) -> Result<Booking, PortError>;

    /// Reads a payment without locking it
    async fn get_payment(&self, id: PaymentId) -> Result<Payment, PortError>;

    /// Reads the participation a booking belongs to
    async fn get_participation(&self, id: ParticipantId) -> Result<Participation, PortError>;

    /// Finds the booking opened for a participation, if any
    async fn find_booking_for_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Booking>, PortError>;

    /// Lists a booking's payments, oldest first
    async fn payments_for_booking(&self, id: BookingId) -> Result<Vec<Payment>, PortError>;
}

/// One atomic unit of ledger writes
///
/// `lock_*` methods take an exclusive lock on the row that is held until the
/// transaction commits or is dropped.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Reads and locks a payment
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Payment, PortError>;

    /// Reads and locks a booking
    async fn lock_booking(&mut self, id: BookingId) -> Result<Booking, PortError>;

    /// Inserts a booking; `Conflict` if the participation already has one
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError>;

    /// Inserts a payment; `Conflict` if its settled transaction id is taken
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    /// Overwrites a payment; `Conflict` if its settled transaction id is taken
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    /// Overwrites a booking
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError>;

    /// Makes every write in this transaction visible
    async fn commit(self: Box<Self>) -> Result<(), PortError>;
}

/// Parameters for opening a checkout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    /// Reference echoed back by the gateway as the transaction id
    pub transaction_ref: String,
    pub amount: Money,
    pub customer: Contact,
    pub product_name: String,
}

/// What the gateway returned when a session was opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Checkout page the tourist is sent to
    pub redirect_url: Option<String>,
    /// Gateway's session key, when it issues one
    pub session_key: Option<String>,
    /// Verbatim response body
    pub raw: serde_json::Value,
}

/// Result of server-side validation of a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: String,
    pub transaction_id: Option<String>,
    /// `None` when the gateway's amount could not be read as a decimal
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    /// Verbatim response body
    pub raw: serde_json::Value,
}

/// A gateway notification reduced to the fields the domain acts on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayNotification {
    /// Our payment id as echoed by the gateway
    pub payment_reference: Option<String>,
    pub transaction_id: Option<String>,
    /// Handle for server-side validation
    pub validation_id: Option<String>,
    /// Status the notification claims; not trusted until validated
    pub claimed_status: Option<String>,
    /// Every field as received
    pub raw: serde_json::Value,
}

/// External payment gateway
#[async_trait]
pub trait PaymentGateway: DomainPort {
    /// Short name used in logs and health reports
    fn name(&self) -> &'static str;

    /// Opens a checkout session for a payment
    async fn initiate(&self, request: &SessionRequest) -> Result<SessionResponse, PortError>;

    /// Asks the gateway to confirm a notification by its validation id
    async fn validate(&self, validation_id: &str) -> Result<ValidationResult, PortError>;

    /// Pulls the domain fields out of a notification's form fields
    fn parse_notification(&self, fields: &HashMap<String, String>) -> GatewayNotification;
}
