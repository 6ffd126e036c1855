//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL side of the tour payments ledger using
//! SQLx: connection pooling, the embedded schema migrations, repositories for
//! bookings, payments and participations, and [`PostgresLedgerStore`], the
//! `LedgerStore` adapter the reconciliation engine runs on in production.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories own the SQL and
//! the row mapping; the adapter composes them into ledger transactions and
//! translates `DatabaseError` into the domain's `PortError`.
//!
//! # Locking
//!
//! Every settle path locks the payment row and then the booking row with
//! `SELECT ... FOR UPDATE`, always in that order, inside one transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/tour_payments")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::PostgresLedgerStore;
