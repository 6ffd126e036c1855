//! Domain Adapters
//!
//! This module provides adapter implementations for domain ports,
//! connecting domain interfaces to the PostgreSQL database layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_payments::LedgerStore;
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! let mut tx = store.begin().await?;
//! let payment = tx.lock_payment(payment_id).await?;
//! ```

pub mod ledger;

pub use ledger::PostgresLedgerStore;
