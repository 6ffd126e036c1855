//! Seeded Ledger Harness
//!
//! Wires an [`InMemoryLedgerStore`] and a [`ScriptedGateway`] into a
//! reconciliation engine and opens one booking, so scenario tests can start
//! from "a tourist owes N" and drive payments from there.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::{BookingId, Currency, Money, PaymentId};
use domain_payments::adapters::{InMemoryLedgerStore, ScriptedGateway};
use domain_payments::{
    Actor, Booking, BookingChannel, IpnHandler, LedgerStore, Participation, Payment,
    PaymentMethod, ReconciliationEngine,
};

use crate::builders::ParticipationBuilder;
use crate::fixtures::MoneyFixtures;

/// One approved participation with its booking, ready for payments
pub struct TestLedger {
    pub store: Arc<InMemoryLedgerStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub engine: Arc<ReconciliationEngine>,
    pub ipn: Arc<IpnHandler>,
    pub participation: Participation,
    pub booking_id: BookingId,
    pub tourist: Actor,
    pub organizer: Actor,
}

impl TestLedger {
    /// A ledger whose booking is due `amount_due` BDT
    pub async fn new(amount_due: Decimal) -> Self {
        Self::with_parts(InMemoryLedgerStore::new(), ScriptedGateway::new(), amount_due).await
    }

    /// Same as [`TestLedger::new`] with a preconfigured store and gateway
    pub async fn with_parts(
        store: InMemoryLedgerStore,
        gateway: ScriptedGateway,
        amount_due: Decimal,
    ) -> Self {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);
        let engine = Arc::new(ReconciliationEngine::new(
            store.clone(),
            gateway.clone(),
            Currency::BDT,
        ));
        let ipn = Arc::new(IpnHandler::new(engine.clone()));

        let participation = ParticipationBuilder::new()
            .with_cost(MoneyFixtures::bdt(amount_due))
            .build();
        store.seed_participation(participation.clone()).await;

        let tourist = Actor::Tourist(participation.tourist_id);
        let organizer = Actor::Organizer(participation.organizer_id);
        let opened = engine
            .open_booking(participation.id, BookingChannel::Online, &tourist)
            .await
            .expect("booking should open for an approved participation");

        Self {
            store,
            gateway,
            engine,
            ipn,
            participation,
            booking_id: opened.booking.id,
            tourist,
            organizer,
        }
    }

    /// Current state of the booking
    pub async fn booking(&self) -> Booking {
        self.store
            .get_booking(self.booking_id)
            .await
            .expect("seeded booking exists")
    }

    /// Current state of a payment
    pub async fn payment(&self, id: PaymentId) -> Payment {
        self.store.get_payment(id).await.expect("payment exists")
    }

    /// All payments against the booking, oldest first
    pub async fn payments(&self) -> Vec<Payment> {
        self.store
            .payments_for_booking(self.booking_id)
            .await
            .expect("payments can be listed")
    }

    /// Starts a gateway payment as the tourist
    pub async fn initiate(&self, amount: Decimal) -> Payment {
        self.engine
            .initiate_gateway_payment(
                self.booking_id,
                MoneyFixtures::bdt(amount),
                PaymentMethod::Gateway,
                &self.tourist,
            )
            .await
            .expect("gateway payment should initiate")
            .payment
    }

    /// Records cash as the organizer
    pub async fn collect_cash(&self, amount: Decimal) -> Payment {
        self.engine
            .create_cash_payment(self.booking_id, MoneyFixtures::bdt(amount), &self.organizer)
            .await
            .expect("cash payment should be recorded")
            .payment
    }

    /// Scripts a genuine validation answer for `payment` under `validation_id`
    pub fn script_valid(&self, payment: &Payment, validation_id: &str) {
        self.gateway.script_validation(
            validation_id,
            ScriptedGateway::valid_response(
                &payment.gateway_reference(),
                payment.amount.amount(),
                Currency::BDT,
            ),
        );
    }

    /// The form fields the gateway posts for `payment`
    pub fn ipn_fields(payment: &Payment, validation_id: &str, status: &str) -> HashMap<String, String> {
        HashMap::from([
            ("value_a".to_string(), payment.id.as_uuid().to_string()),
            ("tran_id".to_string(), payment.gateway_reference()),
            ("val_id".to_string(), validation_id.to_string()),
            ("status".to_string(), status.to_string()),
            ("amount".to_string(), payment.amount.to_fixed()),
            ("currency".to_string(), "BDT".to_string()),
        ])
    }

    /// Sum of the successful payments against the booking
    pub async fn settled_total(&self) -> Money {
        self.payments()
            .await
            .iter()
            .filter(|p| p.is_settled())
            .try_fold(Money::zero(Currency::BDT), |acc, p| acc.checked_add(&p.amount))
            .expect("payments share the booking currency")
    }
}
