//! Reconciliation engine
//!
//! The only component that writes bookings and payments. Each operation runs
//! in exactly one ledger transaction; a payment's settlement and the booking
//! contribution it produces are committed together or not at all.
//!
//! Outbound gateway calls are never made while a transaction is open.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{BookingId, Currency, Money, ParticipantId, PaymentId, UserId};

use crate::actor::{Actor, Capability};
use crate::booking::{Booking, BookingChannel};
use crate::error::PaymentError;
use crate::participation::ParticipationStatus;
use crate::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::ports::{LedgerStore, LedgerTransaction, PaymentGateway, SessionRequest, SessionResponse};

/// A payment after a settle attempt, with its booking as committed
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub payment: Payment,
    pub booking: Booking,
    /// False when the payment was already settled and nothing was re-applied
    pub applied: bool,
}

/// A gateway payment and the checkout session opened for it
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub payment: Payment,
    pub session: SessionResponse,
}

/// Result of opening a booking
#[derive(Debug, Clone)]
pub struct OpenedBooking {
    pub booking: Booking,
    /// False when the participation already had a booking
    pub created: bool,
}

/// A booking with its payments, oldest first
#[derive(Debug, Clone)]
pub struct BookingStatement {
    pub booking: Booking,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettleMode {
    /// Gateway notifications and redirects; terminal states absorb
    Automatic,
    /// Admin or organizer verification; may settle a failed or cancelled payment
    ManualOverride,
}

/// Applies payment outcomes to bookings
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: Currency,
}

impl ReconciliationEngine {
    /// Creates an engine settling payments in `currency`
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: Currency,
    ) -> Self {
        Self {
            store,
            gateway,
            currency,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    /// Currency every gateway amount must be reported in
    pub fn currency(&self) -> Currency {
        self.currency
    }

    // ========================================================================
    // Outcome application
    // ========================================================================

    /// Settles a payment and applies its amount to the booking
    ///
    /// Idempotent: a payment that is already `Success` only gets missing
    /// verification metadata filled in, and its amount is not applied again.
    #[instrument(skip_all, fields(payment_id = %payment_id))]
    pub async fn mark_success(
        &self,
        payment_id: PaymentId,
        transaction_id: Option<String>,
        payload: Option<serde_json::Value>,
    ) -> Result<SettlementOutcome, PaymentError> {
        let mut tx = self.store.begin().await?;
        let payment = tx.lock_payment(payment_id).await?;
        let outcome = self
            .settle_locked(&mut *tx, payment, transaction_id, payload, None, SettleMode::Automatic)
            .await?;
        tx.commit().await?;

        Ok(outcome)
    }

    /// Marks a payment failed; the booking is not touched
    #[instrument(skip_all, fields(payment_id = %payment_id))]
    pub async fn mark_failed(
        &self,
        payment_id: PaymentId,
        payload: Option<serde_json::Value>,
    ) -> Result<Payment, PaymentError> {
        self.close(payment_id, PaymentStatus::Failed, payload).await
    }

    /// Marks a payment cancelled after the tourist abandoned checkout
    #[instrument(skip_all, fields(payment_id = %payment_id))]
    pub async fn mark_cancelled(
        &self,
        payment_id: PaymentId,
        payload: Option<serde_json::Value>,
    ) -> Result<Payment, PaymentError> {
        self.close(payment_id, PaymentStatus::Cancelled, payload).await
    }

    /// Stores a payload on an unsettled payment without changing its status
    #[instrument(skip_all, fields(payment_id = %payment_id))]
    pub async fn annotate(
        &self,
        payment_id: PaymentId,
        payload: serde_json::Value,
    ) -> Result<Payment, PaymentError> {
        let mut tx = self.store.begin().await?;
        let mut payment = tx.lock_payment(payment_id).await?;
        if payment.is_settled() {
            debug!("Payment already settled, payload not stored");
            return Ok(payment);
        }
        payment.record_payload(payload);
        tx.update_payment(&payment).await?;
        tx.commit().await?;

        Ok(payment)
    }

    // ========================================================================
    // Payment creation
    // ========================================================================

    /// Records cash collected by the tour's organizer
    ///
    /// The payment is created settled and its amount applied in the same
    /// transaction. The due check is repeated under the booking lock so
    /// concurrent entries cannot jointly exceed the due amount.
    #[instrument(skip_all, fields(booking_id = %booking_id, amount = %amount))]
    pub async fn create_cash_payment(
        &self,
        booking_id: BookingId,
        amount: Money,
        actor: &Actor,
    ) -> Result<SettlementOutcome, PaymentError> {
        let booking = self.store.get_booking(booking_id).await?;
        let participation = self.store.get_participation(booking.participant_id).await?;
        actor.authorize(Capability::RecordCashPayment, &participation)?;

        ensure_positive(&amount)?;
        ensure_minor_units(&amount)?;
        ensure_same_currency(&booking, &amount)?;
        ensure_within_due(&booking, &amount)?;

        let mut tx = self.store.begin().await?;
        let mut booking = tx.lock_booking(booking_id).await?;
        ensure_within_due(&booking, &amount)?;

        let payment = Payment::new_cash(booking.id, amount, actor.user_id());
        let status = booking.apply_contribution(amount)?;
        tx.insert_payment(&payment).await?;
        tx.update_booking(&booking).await?;
        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            status = status.as_str(),
            amount_paid = %booking.amount_paid,
            "Cash payment recorded"
        );

        Ok(SettlementOutcome {
            payment,
            booking,
            applied: true,
        })
    }

    /// Creates a gateway payment and opens a checkout session for it
    ///
    /// The payment is committed as `Processing` before the gateway is called.
    /// If the gateway errors the payment is marked `Failed` with the error
    /// recorded, and `GatewayUnavailable` is returned.
    #[instrument(skip_all, fields(booking_id = %booking_id, amount = %amount))]
    pub async fn initiate_gateway_payment(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<InitiatedPayment, PaymentError> {
        if method != PaymentMethod::Gateway {
            return Err(PaymentError::validation(format!(
                "method '{}' cannot be initiated online",
                method.as_str()
            )));
        }

        let booking = self.store.get_booking(booking_id).await?;
        let participation = self.store.get_participation(booking.participant_id).await?;
        actor.authorize(Capability::InitiateGatewayPayment, &participation)?;

        if booking.is_paid() {
            return Err(PaymentError::validation(format!(
                "booking {} is already paid",
                booking.id
            )));
        }
        if !participation.is_approved() {
            return Err(PaymentError::validation(format!(
                "participation {} is not approved",
                participation.id
            )));
        }
        ensure_positive(&amount)?;
        ensure_minor_units(&amount)?;
        ensure_same_currency(&booking, &amount)?;
        ensure_within_due(&booking, &amount)?;

        let mut payment = Payment::new_gateway(booking.id, amount, actor.user_id());
        payment.transaction_id = Some(payment.gateway_reference());

        let mut tx = self.store.begin().await?;
        tx.insert_payment(&payment).await?;
        tx.commit().await?;

        let request = SessionRequest {
            payment_id: payment.id,
            booking_id: booking.id,
            transaction_ref: payment.gateway_reference(),
            amount,
            customer: participation.tourist_contact.clone(),
            product_name: format!("Tour Booking #{}", booking.id),
        };

        match self.gateway.initiate(&request).await {
            Ok(session) => {
                let mut tx = self.store.begin().await?;
                let mut payment = tx.lock_payment(payment.id).await?;
                if payment.status == PaymentStatus::Processing {
                    payment.record_payload(session.raw.clone());
                    tx.update_payment(&payment).await?;
                }
                tx.commit().await?;

                info!(payment_id = %payment.id, gateway = self.gateway.name(), "Gateway session opened");
                Ok(InitiatedPayment { payment, session })
            }
            Err(err) => {
                error!(payment_id = %payment.id, error = %err, "Gateway session could not be opened");
                let payload = json!({ "error": err.to_string() });
                self.close(payment.id, PaymentStatus::Failed, Some(payload)).await?;
                Err(PaymentError::GatewayUnavailable(err.to_string()))
            }
        }
    }

    // ========================================================================
    // Manual verification
    // ========================================================================

    /// Settles a payment by hand
    ///
    /// Reuses the payment's transaction id, or `MANUAL-<payment>` if it has
    /// none. This is the only path that may settle a `Failed` or `Cancelled`
    /// payment.
    #[instrument(skip_all, fields(payment_id = %payment_id))]
    pub async fn verify_payment(
        &self,
        payment_id: PaymentId,
        actor: &Actor,
    ) -> Result<SettlementOutcome, PaymentError> {
        let payment = self.store.get_payment(payment_id).await?;
        let booking = self.store.get_booking(payment.booking_id).await?;
        let participation = self.store.get_participation(booking.participant_id).await?;
        actor.authorize(Capability::Verify, &participation)?;

        if payment.is_settled() {
            return Err(already_verified(&payment));
        }

        let mut tx = self.store.begin().await?;
        let payment = tx.lock_payment(payment_id).await?;
        if payment.is_settled() {
            return Err(already_verified(&payment));
        }

        let transaction_id = payment
            .transaction_id
            .clone()
            .unwrap_or_else(|| format!("MANUAL-{}", payment.id.as_uuid()));
        let outcome = self
            .settle_locked(
                &mut *tx,
                payment,
                Some(transaction_id),
                None,
                Some(actor.user_id()),
                SettleMode::ManualOverride,
            )
            .await?;
        tx.commit().await?;

        info!(verified_by = %actor.user_id(), role = actor.role(), "Payment verified manually");
        Ok(outcome)
    }

    /// Marks a fully collected booking as paid by hand
    #[instrument(skip_all, fields(booking_id = %booking_id))]
    pub async fn verify_booking(
        &self,
        booking_id: BookingId,
        actor: &Actor,
    ) -> Result<Booking, PaymentError> {
        let booking = self.store.get_booking(booking_id).await?;
        let participation = self.store.get_participation(booking.participant_id).await?;
        actor.authorize(Capability::Verify, &participation)?;

        let mut tx = self.store.begin().await?;
        let mut booking = tx.lock_booking(booking_id).await?;
        booking.manual_verify()?;
        tx.update_booking(&booking).await?;
        tx.commit().await?;

        info!(verified_by = %actor.user_id(), "Booking verified manually");
        Ok(booking)
    }

    // ========================================================================
    // Bookings
    // ========================================================================

    /// Opens the booking for a participation, or returns the existing one
    #[instrument(skip_all, fields(participant_id = %participant_id))]
    pub async fn open_booking(
        &self,
        participant_id: ParticipantId,
        channel: BookingChannel,
        actor: &Actor,
    ) -> Result<OpenedBooking, PaymentError> {
        let participation = self.store.get_participation(participant_id).await?;
        actor.authorize(Capability::OpenBooking, &participation)?;

        if let Some(booking) = self.store.find_booking_for_participant(participant_id).await? {
            return Ok(OpenedBooking {
                booking,
                created: false,
            });
        }

        if participation.status == ParticipationStatus::Rejected {
            return Err(PaymentError::validation(format!(
                "participation {} was rejected",
                participation.id
            )));
        }
        if participation.cost_per_person.currency() != self.currency {
            return Err(PaymentError::validation(format!(
                "tour is priced in {}, payments are settled in {}",
                participation.cost_per_person.currency(),
                self.currency
            )));
        }

        let booking = Booking::open(&participation, channel);
        let mut tx = self.store.begin().await?;
        match tx.insert_booking(&booking).await {
            Ok(()) => {
                tx.commit().await?;
                info!(booking_id = %booking.id, amount_due = %booking.amount_due, "Booking opened");
                Ok(OpenedBooking {
                    booking,
                    created: true,
                })
            }
            Err(err) if err.is_conflict() => {
                drop(tx);
                let booking = self
                    .store
                    .find_booking_for_participant(participant_id)
                    .await?
                    .ok_or_else(|| PaymentError::BookingNotFound(participant_id.to_string()))?;
                Ok(OpenedBooking {
                    booking,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Reads a booking with its payments
    ///
    /// Bookings the actor may not see are reported as not found.
    pub async fn booking(
        &self,
        booking_id: BookingId,
        actor: &Actor,
    ) -> Result<BookingStatement, PaymentError> {
        let booking = self.store.get_booking(booking_id).await?;
        let participation = self.store.get_participation(booking.participant_id).await?;
        if !actor.can(Capability::ViewBooking, &participation) {
            return Err(PaymentError::BookingNotFound(booking_id.to_string()));
        }
        let payments = self.store.payments_for_booking(booking_id).await?;

        Ok(BookingStatement { booking, payments })
    }

    /// Reads a payment, scoped like [`ReconciliationEngine::booking`]
    pub async fn payment(
        &self,
        payment_id: PaymentId,
        actor: &Actor,
    ) -> Result<Payment, PaymentError> {
        let payment = self.store.get_payment(payment_id).await?;
        let booking = self.store.get_booking(payment.booking_id).await?;
        let participation = self.store.get_participation(booking.participant_id).await?;
        if !actor.can(Capability::ViewBooking, &participation) {
            return Err(PaymentError::PaymentNotFound(payment_id.to_string()));
        }

        Ok(payment)
    }

    // ========================================================================
    // Locked steps shared with the notification handler
    // ========================================================================

    /// Settles a payment the caller has already locked in `tx`
    pub(crate) async fn settle_locked(
        &self,
        tx: &mut dyn LedgerTransaction,
        mut payment: Payment,
        transaction_id: Option<String>,
        payload: Option<serde_json::Value>,
        verified_by: Option<UserId>,
        mode: SettleMode,
    ) -> Result<SettlementOutcome, PaymentError> {
        if payment.is_settled() {
            if payment.backfill_verification(verified_by) {
                tx.update_payment(&payment).await?;
            }
            let booking = tx.lock_booking(payment.booking_id).await?;
            debug!(payment_id = %payment.id, "Payment already settled, contribution not re-applied");
            return Ok(SettlementOutcome {
                payment,
                booking,
                applied: false,
            });
        }

        match mode {
            SettleMode::Automatic if !payment.status.can_transition_to(PaymentStatus::Success) => {
                return Err(PaymentError::InvalidTransition {
                    from: payment.status,
                    to: PaymentStatus::Success,
                });
            }
            SettleMode::ManualOverride if payment.status.is_terminal() => {
                warn!(
                    payment_id = %payment.id,
                    from = payment.status.as_str(),
                    "Manual override settling a closed payment"
                );
            }
            _ => {}
        }

        let mut booking = tx.lock_booking(payment.booking_id).await?;
        let now = Utc::now();

        payment.status = PaymentStatus::Success;
        if transaction_id.is_some() {
            payment.transaction_id = transaction_id;
        }
        if payload.is_some() {
            payment.gateway_payload = payload;
        }
        if verified_by.is_some() {
            payment.verified_by = verified_by;
        }
        payment.verified_at = Some(now);
        payment.updated_at = now;

        let status = booking.apply_contribution(payment.amount)?;
        if booking.is_overpaid() {
            warn!(
                booking_id = %booking.id,
                amount_paid = %booking.amount_paid,
                amount_due = %booking.amount_due,
                "Booking collected more than its due amount"
            );
        }

        tx.update_payment(&payment).await?;
        tx.update_booking(&booking).await?;

        info!(
            payment_id = %payment.id,
            booking_id = %booking.id,
            status = status.as_str(),
            amount_paid = %booking.amount_paid,
            "Payment settled"
        );

        Ok(SettlementOutcome {
            payment,
            booking,
            applied: true,
        })
    }

    /// Moves a payment the caller has already locked to `Failed` or `Cancelled`
    pub(crate) async fn close_locked(
        &self,
        tx: &mut dyn LedgerTransaction,
        mut payment: Payment,
        status: PaymentStatus,
        payload: Option<serde_json::Value>,
    ) -> Result<Payment, PaymentError> {
        if payment.is_settled() {
            return Err(PaymentError::AlreadySettled(format!(
                "payment {} is already settled",
                payment.id
            )));
        }
        payment.transition_to(status)?;
        if let Some(payload) = payload {
            payment.record_payload(payload);
        }
        tx.update_payment(&payment).await?;

        info!(payment_id = %payment.id, status = status.as_str(), "Payment closed");
        Ok(payment)
    }

    async fn close(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
        payload: Option<serde_json::Value>,
    ) -> Result<Payment, PaymentError> {
        let mut tx = self.store.begin().await?;
        let payment = tx.lock_payment(payment_id).await?;
        let payment = self.close_locked(&mut *tx, payment, status, payload).await?;
        tx.commit().await?;

        Ok(payment)
    }
}

fn ensure_positive(amount: &Money) -> Result<(), PaymentError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(PaymentError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )))
    }
}

/// Gateways charge at the currency's minor unit; a finer amount could never
/// validate against what was actually charged
fn ensure_minor_units(amount: &Money) -> Result<(), PaymentError> {
    if amount.is_whole_minor_units() {
        Ok(())
    } else {
        Err(PaymentError::validation(format!(
            "amount {} has more than {} decimal places",
            amount.amount(),
            amount.currency().decimal_places()
        )))
    }
}

fn ensure_same_currency(booking: &Booking, amount: &Money) -> Result<(), PaymentError> {
    if amount.currency() == booking.currency() {
        Ok(())
    } else {
        Err(PaymentError::validation(format!(
            "booking is due in {}, got {}",
            booking.currency(),
            amount.currency()
        )))
    }
}

fn ensure_within_due(booking: &Booking, amount: &Money) -> Result<(), PaymentError> {
    let outstanding = booking.amount_outstanding();
    if *amount > outstanding {
        return Err(PaymentError::validation(format!(
            "amount {} is greater than the {} still due",
            amount, outstanding
        )));
    }
    Ok(())
}

fn already_verified(payment: &Payment) -> PaymentError {
    PaymentError::AlreadyVerified(format!("payment {} is already successful", payment.id))
}
