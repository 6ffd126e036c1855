//! Integration tests for gateway notification handling
//!
//! Covers validated settlement, replay, mismatch rejection, transient
//! validation failures, concurrent redelivery, and the checkout redirect.

use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{Currency, PaymentId};
use domain_payments::adapters::{InMemoryLedgerStore, ScriptedGateway};
use domain_payments::{
    BookingStatus, ErrorKind, IpnOutcome, PaymentError, PaymentStatus, RedirectOutcome,
};
use test_utils::{assert_amount_conserved, assert_booking_state, assert_settled, TestLedger};

// ============================================================================
// Notification handling
// ============================================================================

mod notification_tests {
    use super::*;

    #[tokio::test]
    async fn test_valid_notification_settles_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.script_valid(&payment, "VAL-1");

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(matches!(outcome, IpnOutcome::Settled(_)));
        assert!(outcome.is_accepted());
        let settled = ledger.payment(payment.id).await;
        assert_settled(&settled);
        assert!(settled.verified_by.is_none());
        let stored = settled.gateway_payload.unwrap();
        assert_eq!(stored["ipn"]["val_id"], "VAL-1");
        assert_eq!(stored["validated"]["status"], "VALID");
        assert_booking_state(&ledger.booking().await, BookingStatus::Paid, dec!(100.00));
    }

    #[tokio::test]
    async fn test_redelivered_notification_is_applied_once() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.script_valid(&payment, "VAL-1");
        let fields = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");

        let first = ledger.ipn.handle(&fields).await.unwrap();
        let second = ledger.ipn.handle(&fields).await.unwrap();

        assert!(matches!(first, IpnOutcome::Settled(_)));
        assert!(matches!(second, IpnOutcome::AlreadyProcessed(_)));
        assert_eq!(ledger.gateway.validation_calls(), 1);

        let booking = ledger.booking().await;
        assert_booking_state(&booking, BookingStatus::Paid, dec!(100.00));
        assert_amount_conserved(&booking, &ledger.payments().await);
    }

    #[tokio::test]
    async fn test_amount_mismatch_fails_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_validation(
            "VAL-1",
            ScriptedGateway::valid_response(&payment.gateway_reference(), dec!(90.00), Currency::BDT),
        );

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        match &outcome {
            IpnOutcome::Rejected { reason, .. } => assert!(reason.contains("amount")),
            other => panic!("expected rejection, got {:?}", other),
        }
        let failed = ledger.payment(payment.id).await;
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(failed.gateway_payload.unwrap()["validated"]["amount"], "90.00");
        assert_booking_state(&ledger.booking().await, BookingStatus::Pending, dec!(0));
    }

    #[tokio::test]
    async fn test_amount_with_different_scale_matches() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_validation(
            "VAL-1",
            ScriptedGateway::valid_response(&payment.gateway_reference(), dec!(100), Currency::BDT),
        );

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(matches!(outcome, IpnOutcome::Settled(_)));
    }

    #[tokio::test]
    async fn test_amount_off_by_a_fraction_fails_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_validation(
            "VAL-1",
            ScriptedGateway::valid_response(&payment.gateway_reference(), dec!(99.99996), Currency::BDT),
        );

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Failed);
        assert_booking_state(&ledger.booking().await, BookingStatus::Pending, dec!(0));
    }

    #[tokio::test]
    async fn test_transaction_mismatch_fails_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_validation(
            "VAL-1",
            ScriptedGateway::valid_response("SOMEONE-ELSE", dec!(100.00), Currency::BDT),
        );

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_status_fails_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        let mut response =
            ScriptedGateway::valid_response(&payment.gateway_reference(), dec!(100.00), Currency::BDT);
        response.status = "INVALID_TRANSACTION".to_string();
        ledger.gateway.script_validation("VAL-1", response);

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_currency_mismatch_fails_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_validation(
            "VAL-1",
            ScriptedGateway::valid_response(&payment.gateway_reference(), dec!(100.00), Currency::USD),
        );

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        assert_booking_state(&ledger.booking().await, BookingStatus::Pending, dec!(0));
    }

    #[tokio::test]
    async fn test_unreachable_validation_leaves_status_alone() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_unreachable("VAL-1", "read timed out");
        let fields = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");

        let err = ledger.ipn.handle(&fields).await.unwrap_err();

        assert!(matches!(err, PaymentError::GatewayValidation(_)));
        assert_eq!(err.kind(), ErrorKind::Gateway);
        assert!(err.is_retryable());
        let pending = ledger.payment(payment.id).await;
        assert_eq!(pending.status, PaymentStatus::Processing);
        assert_eq!(pending.gateway_payload.unwrap()["ipn"]["tran_id"], payment.gateway_reference());

        // The gateway redelivers once validation is reachable again
        ledger.script_valid(&payment, "VAL-1");
        let outcome = ledger.ipn.handle(&fields).await.unwrap();
        assert!(matches!(outcome, IpnOutcome::Settled(_)));
        assert_booking_state(&ledger.booking().await, BookingStatus::Paid, dec!(100.00));
    }

    #[tokio::test]
    async fn test_unreachable_validation_stays_retryable_when_payload_cannot_be_stored() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.gateway.script_unreachable("VAL-1", "connection reset");
        ledger.store.fail_payment_updates(true);

        let err = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::GatewayValidation(_)));
        assert!(err.is_retryable());
        ledger.store.fail_payment_updates(false);
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Processing);
    }

    #[tokio::test]
    async fn test_valid_notification_for_cancelled_payment_is_stored_not_applied() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.engine.mark_cancelled(payment.id, None).await.unwrap();
        ledger.script_valid(&payment, "VAL-1");

        let outcome = ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        assert!(!outcome.is_accepted());
        let stored = ledger.payment(payment.id).await;
        assert_eq!(stored.status, PaymentStatus::Cancelled);
        assert_eq!(stored.gateway_payload.unwrap()["validated"]["status"], "VALID");
        assert_booking_state(&ledger.booking().await, BookingStatus::Pending, dec!(0));
    }

    #[tokio::test]
    async fn test_unknown_payment_is_not_found() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let fields = HashMap::from([
            ("value_a".to_string(), PaymentId::new().as_uuid().to_string()),
            ("tran_id".to_string(), "T-1".to_string()),
            ("val_id".to_string(), "VAL-1".to_string()),
        ]);

        let err = ledger.ipn.handle(&fields).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_garbage_reference_is_not_found() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let fields = HashMap::from([
            ("value_a".to_string(), "not-a-payment".to_string()),
            ("tran_id".to_string(), "T-1".to_string()),
        ]);

        let err = ledger.ipn.handle(&fields).await.unwrap_err();

        assert!(matches!(err, PaymentError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;

        let mut without_tran = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");
        without_tran.remove("tran_id");
        let mut without_reference = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");
        without_reference.remove("value_a");
        let mut without_val_id = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");
        without_val_id.remove("val_id");

        for fields in [without_tran, without_reference, without_val_id] {
            let err = ledger.ipn.handle(&fields).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(ledger.gateway.validation_calls(), 0);
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Processing);
    }
}

// ============================================================================
// Concurrent redelivery
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_simultaneous_notifications_settle_once() {
        let store = InMemoryLedgerStore::new().with_write_delay(Duration::from_millis(25));
        let gateway = ScriptedGateway::new().with_validation_delay(Duration::from_millis(50));
        let ledger = Arc::new(TestLedger::with_parts(store, gateway, dec!(100.00)).await);
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.script_valid(&payment, "VAL-1");
        let fields = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                let fields = fields.clone();
                tokio::spawn(async move { ledger.ipn.handle(&fields).await })
            })
            .collect();

        let mut settled = 0;
        let mut replayed = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                IpnOutcome::Settled(_) => settled += 1,
                IpnOutcome::AlreadyProcessed(_) => replayed += 1,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        // Both deliveries passed the unlocked pre-check and reached validation
        assert_eq!(ledger.gateway.validation_calls(), 2);
        assert_eq!(settled, 1);
        assert_eq!(replayed, 1);

        let booking = ledger.booking().await;
        assert_booking_state(&booking, BookingStatus::Paid, dec!(100.00));
        assert_amount_conserved(&booking, &ledger.payments().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_notification_racing_redirect_settles_once() {
        let store = InMemoryLedgerStore::new().with_write_delay(Duration::from_millis(10));
        let gateway = ScriptedGateway::new().with_validation_delay(Duration::from_millis(20));
        let ledger = Arc::new(TestLedger::with_parts(store, gateway, dec!(100.00)).await);
        let payment = ledger.initiate(dec!(60.00)).await;
        ledger.script_valid(&payment, "VAL-1");
        let fields = TestLedger::ipn_fields(&payment, "VAL-1", "VALID");

        let ipn = {
            let ledger = ledger.clone();
            let fields = fields.clone();
            tokio::spawn(async move { ledger.ipn.handle(&fields).await })
        };
        let redirect = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.ipn.handle_redirect(&fields).await })
        };

        assert!(ipn.await.unwrap().unwrap().is_accepted());
        assert_eq!(redirect.await.unwrap(), RedirectOutcome::Success(payment.id));

        let booking = ledger.booking().await;
        assert_booking_state(&booking, BookingStatus::Partial, dec!(60.00));
        assert_amount_conserved(&booking, &ledger.payments().await);
    }
}

// ============================================================================
// Checkout redirect
// ============================================================================

mod redirect_tests {
    use super::*;

    #[tokio::test]
    async fn test_success_redirect_settles_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;

        let outcome = ledger
            .ipn
            .handle_redirect(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await;

        assert_eq!(outcome, RedirectOutcome::Success(payment.id));
        assert_eq!(
            outcome.frontend_path(),
            format!("/success?payment_id={}", payment.id.as_uuid())
        );
        let settled = ledger.payment(payment.id).await;
        assert_settled(&settled);
        assert!(settled.gateway_payload.unwrap().get("redirect").is_some());
        assert_booking_state(&ledger.booking().await, BookingStatus::Paid, dec!(100.00));
    }

    #[tokio::test]
    async fn test_repeated_success_redirect_applies_once() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(40.00)).await;
        let fields = TestLedger::ipn_fields(&payment, "VAL-1", "success");

        ledger.ipn.handle_redirect(&fields).await;
        let outcome = ledger.ipn.handle_redirect(&fields).await;

        assert_eq!(outcome, RedirectOutcome::Success(payment.id));
        assert_booking_state(&ledger.booking().await, BookingStatus::Partial, dec!(40.00));
    }

    #[tokio::test]
    async fn test_cancelled_redirect_cancels_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;

        let outcome = ledger
            .ipn
            .handle_redirect(&TestLedger::ipn_fields(&payment, "VAL-1", "CANCELLED"))
            .await;

        assert_eq!(outcome, RedirectOutcome::Cancelled);
        assert_eq!(outcome.frontend_path(), "/cancelled");
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_failed_redirect_fails_payment() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;

        let outcome = ledger
            .ipn
            .handle_redirect(&TestLedger::ipn_fields(&payment, "VAL-1", "FAILED"))
            .await;

        assert_eq!(outcome, RedirectOutcome::Failure);
        assert_eq!(outcome.frontend_path(), "/failure");
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_failure_redirect_after_settlement_is_ignored() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let payment = ledger.initiate(dec!(100.00)).await;
        ledger.script_valid(&payment, "VAL-1");
        ledger
            .ipn
            .handle(&TestLedger::ipn_fields(&payment, "VAL-1", "VALID"))
            .await
            .unwrap();

        let outcome = ledger
            .ipn
            .handle_redirect(&TestLedger::ipn_fields(&payment, "VAL-1", "FAILED"))
            .await;

        assert_eq!(outcome, RedirectOutcome::Failure);
        assert_eq!(ledger.payment(payment.id).await.status, PaymentStatus::Success);
        assert_booking_state(&ledger.booking().await, BookingStatus::Paid, dec!(100.00));
    }

    #[tokio::test]
    async fn test_redirect_for_unknown_payment_goes_to_failure() {
        let ledger = TestLedger::new(dec!(100.00)).await;
        let fields = HashMap::from([
            ("value_a".to_string(), PaymentId::new().as_uuid().to_string()),
            ("status".to_string(), "VALID".to_string()),
        ]);

        assert_eq!(ledger.ipn.handle_redirect(&fields).await, RedirectOutcome::Failure);
        assert_eq!(ledger.ipn.handle_redirect(&HashMap::new()).await, RedirectOutcome::Failure);
    }
}
