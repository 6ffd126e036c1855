//! Payments Domain - Booking Reconciliation
//!
//! This crate owns the money side of a tour booking: the `Booking` aggregate
//! that accumulates contributions toward a fixed due amount, the `Payment`
//! ledger entries that produce those contributions, and the services that
//! settle payments exactly once no matter how often, or how concurrently,
//! the outcome is reported.
//!
//! # Payment Lifecycle
//!
//! ```text
//! initiated ──► processing ──┬──► success    (contribution applied once)
//!                            ├──► failed
//!                            └──► cancelled  (gateway redirect only)
//! ```
//!
//! Outcomes arrive from four directions: organizer cash entry, the gateway's
//! server-to-server notification (IPN), the browser redirect after checkout,
//! and manual verification by an admin or the tour's organizer. All of them
//! funnel through [`ReconciliationEngine`], which applies the payment and
//! its booking update in one ledger transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_payments::{ReconciliationEngine, IpnHandler};
//!
//! let engine = Arc::new(ReconciliationEngine::new(store, gateway.clone(), Currency::BDT));
//! let ipn = IpnHandler::new(engine.clone());
//!
//! let outcome = ipn.handle(&form_fields).await?;
//! ```

pub mod actor;
pub mod booking;
pub mod error;
pub mod ipn;
pub mod participation;
pub mod payment;
pub mod ports;
pub mod reconciliation;
pub mod adapters;

pub use actor::{Actor, Capability};
pub use booking::{Booking, BookingChannel, BookingStatus};
pub use error::{PaymentError, ErrorKind};
pub use ipn::{IpnHandler, IpnOutcome, RedirectOutcome};
pub use participation::{Contact, Participation, ParticipationStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use ports::{
    LedgerStore, LedgerTransaction, PaymentGateway,
    SessionRequest, SessionResponse, ValidationResult, GatewayNotification,
};
pub use reconciliation::{
    ReconciliationEngine, SettlementOutcome, InitiatedPayment, OpenedBooking, BookingStatement,
};
