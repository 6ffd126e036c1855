//! Adapters for the Payments Domain
//!
//! # Available Adapters
//!
//! - **InMemoryLedgerStore**: `LedgerStore` kept in process memory, for tests
//!   and local runs without a database
//! - **SslCommerzGateway**: `PaymentGateway` backed by the SSLCommerz REST API
//! - **ScriptedGateway**: `PaymentGateway` whose answers are set up in advance
//!
//! The PostgreSQL `LedgerStore` lives in `infra_db`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_payments::adapters::{GatewaySettings, InMemoryLedgerStore, SslCommerzGateway};
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
//! let gateway: Arc<dyn PaymentGateway> = Arc::new(SslCommerzGateway::new(settings)?);
//! ```

pub mod memory;
pub mod scripted;
pub mod sslcommerz;

pub use memory::InMemoryLedgerStore;
pub use scripted::ScriptedGateway;
pub use sslcommerz::{GatewaySettings, SslCommerzGateway};
