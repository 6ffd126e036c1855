//! In-memory ledger store
//!
//! Transactions are serialized by a `tokio::sync::Mutex` held for the whole
//! transaction. Writes go to a staged copy of the ledger that replaces the
//! shared one on commit; dropping the transaction throws the copy away.
//!
//! Tests get a delay applied right after a payment or booking lock is taken,
//! which widens the critical section, and switches that make booking writes
//! or payment updates fail.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    AdapterHealth, BookingId, DomainPort, HealthCheckResult, HealthCheckable, ParticipantId,
    PaymentId, PortError,
};

use crate::booking::Booking;
use crate::participation::Participation;
use crate::payment::{Payment, PaymentStatus};
use crate::ports::{LedgerStore, LedgerTransaction};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    participations: HashMap<ParticipantId, Participation>,
    bookings: HashMap<BookingId, Booking>,
    payments: HashMap<PaymentId, Payment>,
}

impl LedgerState {
    fn ensure_unique_settlement(&self, payment: &Payment) -> Result<(), PortError> {
        if payment.status != PaymentStatus::Success {
            return Ok(());
        }
        let Some(transaction_id) = payment.transaction_id.as_deref() else {
            return Ok(());
        };
        let taken = self.payments.values().any(|other| {
            other.id != payment.id
                && other.status == PaymentStatus::Success
                && other.transaction_id.as_deref() == Some(transaction_id)
        });
        if taken {
            return Err(PortError::conflict(format!(
                "transaction id {} is already settled",
                transaction_id
            )));
        }
        Ok(())
    }
}

/// `LedgerStore` kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    write_delay: Option<Duration>,
    fail_booking_writes: Arc<AtomicBool>,
    fail_payment_updates: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` after every row lock
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Makes every booking write fail until switched off again
    pub fn fail_booking_writes(&self, fail: bool) {
        self.fail_booking_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every update of an existing payment fail until switched off again
    pub fn fail_payment_updates(&self, fail: bool) {
        self.fail_payment_updates.store(fail, Ordering::SeqCst);
    }

    /// Registers a participation owned by the tour side
    pub async fn seed_participation(&self, participation: Participation) {
        self.state
            .lock()
            .await
            .participations
            .insert(participation.id, participation);
    }

    /// Stores a booking directly, bypassing the engine
    pub async fn seed_booking(&self, booking: Booking) {
        self.state.lock().await.bookings.insert(booking.id, booking);
    }

    /// Stores a payment directly, bypassing the engine
    pub async fn seed_payment(&self, payment: Payment) {
        self.state.lock().await.payments.insert(payment.id, payment);
    }

    /// Number of payments recorded
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::new("memory-ledger", AdapterHealth::Healthy, 0)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, PortError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();

        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            write_delay: self.write_delay,
            fail_booking_writes: self.fail_booking_writes.load(Ordering::SeqCst),
            fail_payment_updates: self.fail_payment_updates.load(Ordering::SeqCst),
        }))
    }

    async fn get_booking(&self, id: BookingId) -> Result<Booking, PortError> {
        self.state
            .lock()
            .await
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Booking", id))
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Payment, PortError> {
        self.state
            .lock()
            .await
            .payments
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Payment", id))
    }

    async fn get_participation(&self, id: ParticipantId) -> Result<Participation, PortError> {
        self.state
            .lock()
            .await
            .participations
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Participation", id))
    }

    async fn find_booking_for_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Booking>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .bookings
            .values()
            .find(|b| b.participant_id == id)
            .cloned())
    }

    async fn payments_for_booking(&self, id: BookingId) -> Result<Vec<Payment>, PortError> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.booking_id == id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
    write_delay: Option<Duration>,
    fail_booking_writes: bool,
    fail_payment_updates: bool,
}

impl InMemoryTransaction {
    async fn pause(&self) {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_payment(&mut self, id: PaymentId) -> Result<Payment, PortError> {
        let payment = self
            .staged
            .payments
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Payment", id))?;
        self.pause().await;
        Ok(payment)
    }

    async fn lock_booking(&mut self, id: BookingId) -> Result<Booking, PortError> {
        let booking = self
            .staged
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Booking", id))?;
        self.pause().await;
        Ok(booking)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        if self.fail_booking_writes {
            return Err(PortError::internal("booking writes are disabled"));
        }
        let exists = self
            .staged
            .bookings
            .values()
            .any(|b| b.participant_id == booking.participant_id);
        if exists {
            return Err(PortError::conflict(format!(
                "participation {} already has a booking",
                booking.participant_id
            )));
        }
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        if self.staged.payments.contains_key(&payment.id) {
            return Err(PortError::conflict(format!("payment {} already exists", payment.id)));
        }
        self.staged.ensure_unique_settlement(payment)?;
        self.staged.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        if self.fail_payment_updates {
            return Err(PortError::internal("payment updates are disabled"));
        }
        if !self.staged.payments.contains_key(&payment.id) {
            return Err(PortError::not_found("Payment", payment.id));
        }
        self.staged.ensure_unique_settlement(payment)?;
        self.staged.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError> {
        if self.fail_booking_writes {
            return Err(PortError::internal("booking writes are disabled"));
        }
        if !self.staged.bookings.contains_key(&booking.id) {
            return Err(PortError::not_found("Booking", booking.id));
        }
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let InMemoryTransaction {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
