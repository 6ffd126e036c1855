//! Scripted gateway
//!
//! A `PaymentGateway` whose answers are set up in advance. Validation
//! responses are keyed by validation id; notifications are read with the
//! same field names as SSLCommerz so tests can post realistic forms.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use core_kernel::{Currency, DomainPort, PortError};

use crate::adapters::sslcommerz::notification_from_fields;
use crate::ports::{
    GatewayNotification, PaymentGateway, SessionRequest, SessionResponse, ValidationResult,
};

#[derive(Debug, Clone)]
enum ScriptedValidation {
    Respond(ValidationResult),
    Unreachable(String),
}

/// In-process gateway with canned responses
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    initiate_error: Mutex<Option<String>>,
    validations: Mutex<HashMap<String, ScriptedValidation>>,
    sessions: Mutex<Vec<SessionRequest>>,
    validation_delay: Option<Duration>,
    validation_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` inside every validation call
    pub fn with_validation_delay(mut self, delay: Duration) -> Self {
        self.validation_delay = Some(delay);
        self
    }

    /// Makes session requests fail with `message` until cleared
    pub fn fail_initiate(&self, message: Option<&str>) {
        *lock(&self.initiate_error) = message.map(str::to_string);
    }

    /// Answers validation of `validation_id` with `result`
    pub fn script_validation(&self, validation_id: &str, result: ValidationResult) {
        lock(&self.validations).insert(
            validation_id.to_string(),
            ScriptedValidation::Respond(result),
        );
    }

    /// Makes validation of `validation_id` fail as if the gateway were down
    pub fn script_unreachable(&self, validation_id: &str, message: &str) {
        lock(&self.validations).insert(
            validation_id.to_string(),
            ScriptedValidation::Unreachable(message.to_string()),
        );
    }

    /// A validation response as the gateway sends it for a genuine payment
    pub fn valid_response(transaction_id: &str, amount: Decimal, currency: Currency) -> ValidationResult {
        ValidationResult {
            status: "VALID".to_string(),
            transaction_id: Some(transaction_id.to_string()),
            amount: Some(amount),
            currency: Some(currency.code().to_string()),
            raw: json!({
                "status": "VALID",
                "tran_id": transaction_id,
                "amount": amount.to_string(),
                "currency": currency.code(),
            }),
        }
    }

    /// Session requests received so far
    pub fn sessions(&self) -> Vec<SessionRequest> {
        lock(&self.sessions).clone()
    }

    /// Number of validation calls received so far
    pub fn validation_calls(&self) -> usize {
        self.validation_calls.load(Ordering::SeqCst)
    }
}

impl DomainPort for ScriptedGateway {}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn initiate(&self, request: &SessionRequest) -> Result<SessionResponse, PortError> {
        lock(&self.sessions).push(request.clone());

        let failure = lock(&self.initiate_error).clone();
        if let Some(message) = failure {
            return Err(PortError::connection(message));
        }

        let session_key = format!("session-{}", request.payment_id.as_uuid());
        let redirect_url = format!("https://gateway.test/pay/{}", session_key);
        Ok(SessionResponse {
            redirect_url: Some(redirect_url.clone()),
            session_key: Some(session_key.clone()),
            raw: json!({
                "status": "SUCCESS",
                "sessionkey": session_key,
                "GatewayPageURL": redirect_url,
            }),
        })
    }

    async fn validate(&self, validation_id: &str) -> Result<ValidationResult, PortError> {
        self.validation_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.validation_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = lock(&self.validations).get(validation_id).cloned();
        match scripted {
            Some(ScriptedValidation::Respond(result)) => Ok(result),
            Some(ScriptedValidation::Unreachable(message)) => Err(PortError::Timeout {
                operation: format!("validate {}: {}", validation_id, message),
                duration_ms: 20_000,
            }),
            None => Err(PortError::ServiceUnavailable {
                service: format!("no scripted validation for {}", validation_id),
            }),
        }
    }

    fn parse_notification(&self, fields: &HashMap<String, String>) -> GatewayNotification {
        notification_from_fields(fields)
    }
}
