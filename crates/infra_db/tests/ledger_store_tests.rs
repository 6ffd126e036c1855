//! PostgreSQL ledger store tests
//!
//! These run against a throwaway PostgreSQL container and are ignored by
//! default; run them with `cargo test -p infra_db -- --ignored` on a machine
//! with Docker.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{Currency, HealthCheckable, AdapterHealth};
use domain_payments::adapters::ScriptedGateway;
use domain_payments::{
    Actor, BookingChannel, BookingStatus, IpnHandler, IpnOutcome, LedgerStore, PaymentMethod,
    PaymentStatus, ReconciliationEngine,
};
use infra_db::PostgresLedgerStore;
use test_utils::{
    assert_amount_conserved, assert_booking_state, seed_participation, seed_user,
    ActorFixtures, BookingBuilder, MoneyFixtures, ParticipationBuilder, PaymentBuilder,
    TestDatabase, TestLedger,
};

struct PgLedger {
    _db: TestDatabase,
    store: Arc<PostgresLedgerStore>,
    gateway: Arc<ScriptedGateway>,
    engine: Arc<ReconciliationEngine>,
    tourist: Actor,
    organizer: Actor,
    booking_id: core_kernel::BookingId,
}

impl PgLedger {
    async fn new(amount_due: rust_decimal::Decimal, gateway: ScriptedGateway) -> Self {
        let db = TestDatabase::new().await.expect("Failed to start PostgreSQL");
        let participation = ParticipationBuilder::new()
            .with_cost(MoneyFixtures::bdt(amount_due))
            .build();
        seed_participation(db.pool(), &participation).await.unwrap();

        let store = Arc::new(PostgresLedgerStore::new(db.pool().clone()));
        let gateway = Arc::new(gateway);
        let engine = Arc::new(ReconciliationEngine::new(
            store.clone(),
            gateway.clone(),
            Currency::BDT,
        ));
        let tourist = Actor::Tourist(participation.tourist_id);
        let organizer = Actor::Organizer(participation.organizer_id);
        let booking_id = engine
            .open_booking(participation.id, BookingChannel::Online, &tourist)
            .await
            .unwrap()
            .booking
            .id;

        Self {
            _db: db,
            store,
            gateway,
            engine,
            tourist,
            organizer,
            booking_id,
        }
    }
}

// ============================================================================
// Repository round trips
// ============================================================================

mod store_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_participation_is_read_with_tour_and_contact() {
        let db = TestDatabase::new().await.unwrap();
        let participation = ParticipationBuilder::new().build();
        seed_participation(db.pool(), &participation).await.unwrap();
        let store = PostgresLedgerStore::new(db.pool().clone());

        let loaded = store.get_participation(participation.id).await.unwrap();

        assert_eq!(loaded, participation);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_uncommitted_writes_are_rolled_back() {
        let db = TestDatabase::new().await.unwrap();
        let participation = ParticipationBuilder::new().build();
        seed_participation(db.pool(), &participation).await.unwrap();
        let store = PostgresLedgerStore::new(db.pool().clone());
        let booking = BookingBuilder::for_participation(&participation).build();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_booking(&booking).await.unwrap();
        }
        assert!(store.get_booking(booking.id).await.unwrap_err().is_not_found());

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();
        let stored = store.get_booking(booking.id).await.unwrap();
        assert_eq!(stored.id, booking.id);
        assert_eq!(stored.amount_due, booking.amount_due);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_second_booking_for_participation_conflicts() {
        let db = TestDatabase::new().await.unwrap();
        let participation = ParticipationBuilder::new().build();
        seed_participation(db.pool(), &participation).await.unwrap();
        let store = PostgresLedgerStore::new(db.pool().clone());

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&BookingBuilder::for_participation(&participation).build())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_booking(&BookingBuilder::for_participation(&participation).build())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_settled_transaction_id_is_unique() {
        let ledger = PgLedger::new(dec!(100.00), ScriptedGateway::new()).await;
        let amount = MoneyFixtures::bdt(dec!(10.00));
        let first = PaymentBuilder::gateway(ledger.booking_id, amount)
            .with_transaction_id(Some("T-SHARED"))
            .with_created_by(ledger.tourist.user_id())
            .build();
        let second = PaymentBuilder::gateway(ledger.booking_id, amount)
            .with_transaction_id(Some("T-SHARED"))
            .with_created_by(ledger.tourist.user_id())
            .build();

        let mut tx = ledger.store.begin().await.unwrap();
        tx.insert_payment(&first).await.unwrap();
        tx.insert_payment(&second).await.unwrap();
        tx.commit().await.unwrap();

        ledger.engine.mark_success(first.id, None, None).await.unwrap();
        let err = ledger.engine.mark_success(second.id, None, None).await.unwrap_err();

        assert_eq!(err.kind(), domain_payments::ErrorKind::AlreadySettled);
        assert_eq!(
            ledger.store.get_payment(second.id).await.unwrap().status,
            PaymentStatus::Processing
        );
        assert_booking_state(
            &ledger.store.get_booking(ledger.booking_id).await.unwrap(),
            BookingStatus::Partial,
            dec!(10.00),
        );
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_health_check_reports_healthy() {
        let db = TestDatabase::new().await.unwrap();
        let store = PostgresLedgerStore::new(db.pool().clone());

        assert_eq!(store.health_check().await.status, AdapterHealth::Healthy);
    }
}

// ============================================================================
// Engine on PostgreSQL
// ============================================================================

mod engine_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_cash_then_verification_flow() {
        let ledger = PgLedger::new(dec!(100.00), ScriptedGateway::new()).await;

        ledger
            .engine
            .create_cash_payment(ledger.booking_id, MoneyFixtures::bdt(dec!(40.00)), &ledger.organizer)
            .await
            .unwrap();
        let initiated = ledger
            .engine
            .initiate_gateway_payment(
                ledger.booking_id,
                MoneyFixtures::bdt(dec!(60.00)),
                PaymentMethod::Gateway,
                &ledger.tourist,
            )
            .await
            .unwrap();

        let admin = ActorFixtures::admin();
        seed_user(ledger.store.pool(), &admin).await.unwrap();
        let outcome = ledger
            .engine
            .verify_payment(initiated.payment.id, &admin)
            .await
            .unwrap();

        assert_eq!(outcome.payment.verified_by, Some(admin.user_id()));
        let statement = ledger.engine.booking(ledger.booking_id, &admin).await.unwrap();
        assert_booking_state(&statement.booking, BookingStatus::Paid, dec!(100.00));
        assert!(statement.booking.paid_at.is_some());
        assert_amount_conserved(&statement.booking, &statement.payments);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires docker"]
    async fn test_simultaneous_notifications_settle_once() {
        let gateway = ScriptedGateway::new().with_validation_delay(Duration::from_millis(50));
        let ledger = PgLedger::new(dec!(100.00), gateway).await;
        let payment = ledger
            .engine
            .initiate_gateway_payment(
                ledger.booking_id,
                MoneyFixtures::bdt(dec!(100.00)),
                PaymentMethod::Gateway,
                &ledger.tourist,
            )
            .await
            .unwrap()
            .payment;
        ledger.gateway.script_validation(
            "VAL-PG",
            ScriptedGateway::valid_response(&payment.gateway_reference(), dec!(100.00), Currency::BDT),
        );
        let fields = TestLedger::ipn_fields(&payment, "VAL-PG", "VALID");
        let ipn = Arc::new(IpnHandler::new(ledger.engine.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ipn = ipn.clone();
                let fields = fields.clone();
                tokio::spawn(async move { ipn.handle(&fields).await })
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(outcome.is_accepted());
            if matches!(outcome, IpnOutcome::Settled(_)) {
                settled += 1;
            }
        }

        assert_eq!(settled, 1);
        let booking = ledger.store.get_booking(ledger.booking_id).await.unwrap();
        let payments = ledger.store.payments_for_booking(ledger.booking_id).await.unwrap();
        assert_booking_state(&booking, BookingStatus::Paid, dec!(100.00));
        assert_amount_conserved(&booking, &payments);
    }
}
