//! Gateway notification handling
//!
//! [`IpnHandler`] turns the gateway's server-to-server notifications into at
//! most one settlement per payment, however many times the gateway redelivers
//! them. The claimed outcome is never trusted: it is confirmed with the
//! gateway's validation API first, and that call happens before any row lock
//! is taken. The idempotency check is then repeated under the payment lock.
//!
//! The browser redirect that ends a checkout is handled here too. It is
//! advisory: whatever the state machine rejects is ignored, and the caller
//! always gets somewhere to send the tourist.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use core_kernel::{Currency, PaymentId};

use crate::error::PaymentError;
use crate::payment::{Payment, PaymentStatus};
use crate::ports::{GatewayNotification, PaymentGateway, ValidationResult};
use crate::reconciliation::{ReconciliationEngine, SettleMode, SettlementOutcome};

/// Statuses the validation API reports for a genuine payment
const VALID_STATUSES: [&str; 2] = ["valid", "validated"];

/// Statuses the checkout redirect reports for a completed payment
const REDIRECT_SUCCESS_STATUSES: [&str; 3] = ["valid", "validated", "success"];

/// What happened to a notification
#[derive(Debug, Clone)]
pub enum IpnOutcome {
    /// Validation passed and the payment was settled now
    Settled(SettlementOutcome),
    /// The payment was settled by an earlier delivery
    AlreadyProcessed(Payment),
    /// The notification did not check out, or the payment is closed
    Rejected { payment: Payment, reason: String },
}

impl IpnOutcome {
    /// True for outcomes the gateway should not redeliver
    pub fn is_accepted(&self) -> bool {
        !matches!(self, IpnOutcome::Rejected { .. })
    }

    pub fn payment(&self) -> &Payment {
        match self {
            IpnOutcome::Settled(outcome) => &outcome.payment,
            IpnOutcome::AlreadyProcessed(payment) => payment,
            IpnOutcome::Rejected { payment, .. } => payment,
        }
    }
}

/// Where to send the tourist after checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success(PaymentId),
    Cancelled,
    Failure,
}

impl RedirectOutcome {
    /// Path on the frontend, relative to its base URL
    pub fn frontend_path(&self) -> String {
        match self {
            RedirectOutcome::Success(id) => format!("/success?payment_id={}", id.as_uuid()),
            RedirectOutcome::Cancelled => "/cancelled".to_string(),
            RedirectOutcome::Failure => "/failure".to_string(),
        }
    }
}

/// Validates gateway notifications and feeds them to the engine
pub struct IpnHandler {
    engine: Arc<ReconciliationEngine>,
}

impl IpnHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        self.engine.gateway()
    }

    /// Processes one IPN delivery
    ///
    /// Returns `GatewayValidation` when the validation API could not be
    /// reached; the notification is stored on the payment and its status is
    /// left alone so a redelivery can complete it.
    #[instrument(skip_all)]
    pub async fn handle(
        &self,
        fields: &HashMap<String, String>,
    ) -> Result<IpnOutcome, PaymentError> {
        let notification = self.gateway().parse_notification(fields);

        let reference = required(&notification.payment_reference, "payment reference")?;
        let transaction_id = required(&notification.transaction_id, "transaction id")?.to_string();
        let payment_id: PaymentId = reference
            .parse()
            .map_err(|_| PaymentError::PaymentNotFound(reference.to_string()))?;

        let payment = self.engine.store().get_payment(payment_id).await?;
        if payment.is_settled() {
            info!(payment_id = %payment_id, "Notification already processed");
            return Ok(IpnOutcome::AlreadyProcessed(payment));
        }

        let validation_id = required(&notification.validation_id, "validation id")?;
        let validation = match self.gateway().validate(validation_id).await {
            Ok(validation) => validation,
            Err(err) => {
                warn!(payment_id = %payment_id, error = %err, "Notification validation failed, awaiting redelivery");
                let payload = json!({ "ipn": notification.raw, "error": err.to_string() });
                if let Err(store_err) = self.engine.annotate(payment_id, payload).await {
                    error!(payment_id = %payment_id, error = %store_err, "Could not store undelivered notification");
                }
                return Err(PaymentError::GatewayValidation(err.to_string()));
            }
        };

        let verdict = check_validation(
            &payment,
            &transaction_id,
            &validation,
            self.engine.currency(),
        );
        let payload = json!({ "ipn": notification.raw, "validated": validation.raw });

        self.apply(payment_id, transaction_id, verdict, payload).await
    }

    /// Applies a validated notification under the payment lock
    async fn apply(
        &self,
        payment_id: PaymentId,
        transaction_id: String,
        verdict: Result<(), String>,
        payload: serde_json::Value,
    ) -> Result<IpnOutcome, PaymentError> {
        let mut tx = self.engine.store().begin().await?;
        let mut payment = tx.lock_payment(payment_id).await?;

        match payment.status {
            PaymentStatus::Success => {
                info!(payment_id = %payment_id, "Notification already processed by a concurrent delivery");
                Ok(IpnOutcome::AlreadyProcessed(payment))
            }
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                let reason = format!("payment is already {}", payment.status);
                warn!(
                    payment_id = %payment_id,
                    status = payment.status.as_str(),
                    valid = verdict.is_ok(),
                    "Notification for a closed payment stored for review"
                );
                payment.record_payload(payload);
                tx.update_payment(&payment).await?;
                tx.commit().await?;
                Ok(IpnOutcome::Rejected { payment, reason })
            }
            PaymentStatus::Initiated | PaymentStatus::Processing => match verdict {
                Ok(()) => {
                    let outcome = self
                        .engine
                        .settle_locked(
                            &mut *tx,
                            payment,
                            Some(transaction_id),
                            Some(payload),
                            None,
                            SettleMode::Automatic,
                        )
                        .await?;
                    tx.commit().await?;
                    Ok(IpnOutcome::Settled(outcome))
                }
                Err(reason) => {
                    warn!(payment_id = %payment_id, reason = %reason, "Notification rejected");
                    let payment = self
                        .engine
                        .close_locked(&mut *tx, payment, PaymentStatus::Failed, Some(payload))
                        .await?;
                    tx.commit().await?;
                    Ok(IpnOutcome::Rejected { payment, reason })
                }
            },
        }
    }

    /// Processes the browser redirect that ends a checkout
    ///
    /// Never fails; errors are logged and the tourist is sent to the page
    /// matching the status the gateway reported.
    #[instrument(skip_all)]
    pub async fn handle_redirect(&self, fields: &HashMap<String, String>) -> RedirectOutcome {
        let notification = self.gateway().parse_notification(fields);

        let Some(payment_id) = notification
            .payment_reference
            .as_deref()
            .and_then(|reference| reference.parse::<PaymentId>().ok())
        else {
            return RedirectOutcome::Failure;
        };
        if let Err(err) = self.engine.store().get_payment(payment_id).await {
            warn!(payment_id = %payment_id, error = %err, "Redirect for unknown payment");
            return RedirectOutcome::Failure;
        }

        let status = claimed_status(&notification);
        let payload = Some(json!({ "redirect": notification.raw }));

        if REDIRECT_SUCCESS_STATUSES.contains(&status.as_str()) {
            let result = self
                .engine
                .mark_success(payment_id, notification.transaction_id.clone(), payload)
                .await;
            ignore_rejected(payment_id, "success", result.map(|_| ()));
            RedirectOutcome::Success(payment_id)
        } else if status == "cancelled" {
            let result = self.engine.mark_cancelled(payment_id, payload).await;
            ignore_rejected(payment_id, "cancelled", result.map(|_| ()));
            RedirectOutcome::Cancelled
        } else {
            let result = self.engine.mark_failed(payment_id, payload).await;
            ignore_rejected(payment_id, "failed", result.map(|_| ()));
            RedirectOutcome::Failure
        }
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, PaymentError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::validation(format!("missing {}", what)))
}

fn claimed_status(notification: &GatewayNotification) -> String {
    notification
        .claimed_status
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn ignore_rejected(payment_id: PaymentId, wanted: &str, result: Result<(), PaymentError>) {
    if let Err(err) = result {
        warn!(payment_id = %payment_id, wanted, error = %err, "Redirect update ignored");
    }
}

/// Compares a validation response with the payment it claims to settle
///
/// Amounts must match exactly; the comparison is numeric, so `100.00`
/// matches `100` but `99.99996` does not match `100.00`.
pub fn check_validation(
    payment: &Payment,
    transaction_id: &str,
    validation: &ValidationResult,
    currency: Currency,
) -> Result<(), String> {
    let status = validation.status.trim().to_ascii_lowercase();
    if !VALID_STATUSES.contains(&status.as_str()) {
        return Err(format!("gateway reported status '{}'", validation.status));
    }

    if validation.transaction_id.as_deref() != Some(transaction_id) {
        return Err(format!(
            "transaction id mismatch: notified {}, validated {:?}",
            transaction_id, validation.transaction_id
        ));
    }

    let validated_currency = validation
        .currency
        .as_deref()
        .and_then(|code| code.parse::<Currency>().ok());
    if validated_currency != Some(currency) || payment.amount.currency() != currency {
        return Err(format!(
            "currency mismatch: expected {}, validated {:?}",
            currency, validation.currency
        ));
    }

    match validation.amount {
        Some(amount) if amount == payment.amount.amount() => Ok(()),
        Some(amount) => Err(format!(
            "amount mismatch: payment {}, validated {}",
            payment.amount.amount(),
            amount
        )),
        None => Err("validated amount missing or unreadable".to_string()),
    }
}
