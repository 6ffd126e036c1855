//! PostgreSQL Ledger Adapter
//!
//! Implements `LedgerStore` on top of the booking, payment and participation
//! repositories. Each `LedgerTransaction` wraps one `sqlx::Transaction`:
//! `lock_*` calls issue `SELECT ... FOR UPDATE`, so two transactions settling
//! the same payment are serialized by PostgreSQL, and dropping a transaction
//! without committing rolls it back.
//!
//! # Error Handling
//!
//! Database errors are translated to `PortError` variants through
//! `From<DatabaseError>`:
//! - `DatabaseError::NotFound` -> `PortError::NotFound`
//! - `DatabaseError::DuplicateEntry` -> `PortError::Conflict`
//! - Other errors -> `PortError::Internal` or a transient variant

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, BookingId, DomainPort, HealthCheckResult, HealthCheckable, ParticipantId,
    PaymentId, PortError,
};
use domain_payments::{Booking, LedgerStore, LedgerTransaction, Participation, Payment};

use crate::error::DatabaseError;
use crate::repositories::{BookingRepository, ParticipationRepository, PaymentRepository};

/// PostgreSQL-backed implementation of the `LedgerStore` port
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    bookings: BookingRepository,
    payments: PaymentRepository,
    participations: ParticipationRepository,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            bookings: BookingRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            participations: ParticipationRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Performs a `SELECT 1` to verify the pool is operational
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::new("postgres-ledger", AdapterHealth::Healthy, latency_ms),
            Err(e) => HealthCheckResult::new("postgres-ledger", AdapterHealth::Unhealthy, latency_ms)
                .with_message(format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, PortError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::from(DatabaseError::from(e)))?;
        debug!("Ledger transaction started");

        Ok(Box::new(PostgresLedgerTransaction { tx }))
    }

    #[instrument(skip(self), fields(booking_id = %id))]
    async fn get_booking(&self, id: BookingId) -> Result<Booking, PortError> {
        Ok(self.bookings.get_by_id(id).await?)
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn get_payment(&self, id: PaymentId) -> Result<Payment, PortError> {
        Ok(self.payments.get_by_id(id).await?)
    }

    #[instrument(skip(self), fields(participant_id = %id))]
    async fn get_participation(&self, id: ParticipantId) -> Result<Participation, PortError> {
        Ok(self.participations.get_by_id(id).await?)
    }

    #[instrument(skip(self), fields(participant_id = %id))]
    async fn find_booking_for_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Booking>, PortError> {
        Ok(self.bookings.find_by_participant(id).await?)
    }

    #[instrument(skip(self), fields(booking_id = %id))]
    async fn payments_for_booking(&self, id: BookingId) -> Result<Vec<Payment>, PortError> {
        Ok(self.payments.list_for_booking(id).await?)
    }
}

/// One PostgreSQL transaction over the ledger tables
struct PostgresLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    #[instrument(skip(self), fields(payment_id = %id))]
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Payment, PortError> {
        debug!("Locking payment row");
        Ok(PaymentRepository::lock(&mut *self.tx, id).await?)
    }

    #[instrument(skip(self), fields(booking_id = %id))]
    async fn lock_booking(&mut self, id: BookingId) -> Result<Booking, PortError> {
        debug!("Locking booking row");
        Ok(BookingRepository::lock(&mut *self.tx, id).await?)
    }

    #[instrument(skip_all, fields(booking_id = %booking.id))]
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        Ok(BookingRepository::insert(&mut *self.tx, booking).await?)
    }

    #[instrument(skip_all, fields(payment_id = %payment.id))]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        Ok(PaymentRepository::insert(&mut *self.tx, payment).await?)
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, status = payment.status.as_str()))]
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        Ok(PaymentRepository::update(&mut *self.tx, payment).await?)
    }

    #[instrument(skip_all, fields(booking_id = %booking.id, status = booking.status.as_str()))]
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        Ok(BookingRepository::update(&mut *self.tx, booking).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx
            .commit()
            .await
            .map_err(|e| PortError::from(DatabaseError::TransactionFailed(e.to_string())))?;
        debug!("Ledger transaction committed");
        Ok(())
    }
}
