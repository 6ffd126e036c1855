//! SSLCommerz Gateway Adapter
//!
//! Implements `PaymentGateway` against the SSLCommerz REST API:
//!
//! - Session:    `POST {base}/gwprocess/v4/api.php` (form encoded)
//! - Validation: `GET {base}/validator/api/validationserverAPI.php`
//!
//! The base URL is the sandbox or the live host depending on configuration.
//!
//! # Error Handling
//!
//! HTTP failures are mapped to `PortError` variants:
//! - Timeouts -> `PortError::Timeout`
//! - Connection failures -> `PortError::Connection`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - Unreadable bodies -> `PortError::Transformation`
//! - A session the gateway refuses -> `PortError::Validation`
//!
//! A circuit breaker short-circuits calls with `ServiceUnavailable` after
//! repeated failures.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use core_kernel::{
    AdapterHealth, CircuitBreakerConfig, Currency, DomainPort, HealthCheckResult,
    HealthCheckable, PortError,
};

use crate::ports::{
    GatewayNotification, PaymentGateway, SessionRequest, SessionResponse, ValidationResult,
};

const SANDBOX_BASE_URL: &str = "https://sandbox.sslcommerz.com";
const LIVE_BASE_URL: &str = "https://securepay.sslcommerz.com";
const SESSION_PATH: &str = "/gwprocess/v4/api.php";
const VALIDATION_PATH: &str = "/validator/api/validationserverAPI.php";

/// Configuration for the SSLCommerz adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub store_id: String,

    #[serde(skip_serializing)]
    pub store_password: String,

    /// Use the sandbox host instead of the live one
    pub sandbox: bool,

    /// Overrides the sandbox/live host
    pub base_url: Option<String>,

    /// Where the gateway sends the tourist back to
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,

    /// Server-to-server notification endpoint, when not set in the merchant panel
    pub ipn_url: Option<String>,

    /// Currency every session is opened in
    pub currency: Currency,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            store_id: String::new(),
            store_password: String::new(),
            sandbox: true,
            base_url: None,
            success_url: "http://localhost:8080/payments/success".to_string(),
            fail_url: "http://localhost:8080/payments/success".to_string(),
            cancel_url: "http://localhost:8080/payments/success".to_string(),
            ipn_url: None,
            currency: Currency::BDT,
            timeout_secs: 20,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

impl GatewaySettings {
    /// Host all API calls go to
    pub fn base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => SANDBOX_BASE_URL,
            None => LIVE_BASE_URL,
        }
    }
}

/// Circuit breaker state for fault tolerance
#[derive(Debug)]
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    is_open: AtomicBool,
    last_failure_time: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            last_failure_time: RwLock::new(None),
        }
    }

    async fn is_available(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        // Half-open once the reset timeout has passed
        let last_failure = self.last_failure_time.read().await;
        if let Some(time) = *last_failure {
            if time.elapsed() > Duration::from_secs(self.config.reset_timeout_secs) {
                return true;
            }
        }

        false
    }

    fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        let success = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
        if success >= self.config.success_threshold as u64 {
            self.is_open.store(false, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    async fn record_failure(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.failure_threshold as u64 {
            self.is_open.store(true, Ordering::Relaxed);
            *self.last_failure_time.write().await = Some(Instant::now());
        }
    }
}

/// SSLCommerz adapter implementing the PaymentGateway trait
#[derive(Debug)]
pub struct SslCommerzGateway {
    settings: GatewaySettings,
    client: reqwest::Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl SslCommerzGateway {
    /// Creates the adapter and its HTTP client
    pub fn new(settings: GatewaySettings) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PortError::connection_with_source("failed to build HTTP client", e))?;
        let circuit_breaker = settings
            .circuit_breaker
            .clone()
            .map(|cb| Arc::new(CircuitBreaker::new(cb)));

        Ok(Self {
            settings,
            client,
            circuit_breaker,
        })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Checks if the circuit breaker is open (blocking requests)
    pub async fn is_circuit_open(&self) -> bool {
        match &self.circuit_breaker {
            Some(cb) => !cb.is_available().await,
            None => false,
        }
    }

    async fn guard(&self) -> Result<(), PortError> {
        if self.is_circuit_open().await {
            return Err(PortError::ServiceUnavailable {
                service: "sslcommerz (circuit breaker open)".to_string(),
            });
        }
        Ok(())
    }

    async fn observe<T>(&self, result: Result<T, PortError>) -> Result<T, PortError> {
        if let Some(cb) = &self.circuit_breaker {
            match &result {
                Ok(_) => cb.record_success(),
                Err(err) if err.is_transient() => cb.record_failure().await,
                Err(_) => {}
            }
        }
        result
    }

    fn session_form(&self, request: &SessionRequest) -> Vec<(&'static str, String)> {
        let customer = &request.customer;
        let phone = customer
            .phone
            .clone()
            .unwrap_or_else(|| "01700000000".to_string());

        let mut form = vec![
            ("store_id", self.settings.store_id.clone()),
            ("store_passwd", self.settings.store_password.clone()),
            ("total_amount", request.amount.to_fixed()),
            ("currency", self.settings.currency.code().to_string()),
            ("tran_id", request.transaction_ref.clone()),
            ("success_url", self.settings.success_url.clone()),
            ("fail_url", self.settings.fail_url.clone()),
            ("cancel_url", self.settings.cancel_url.clone()),
            ("cus_name", customer.name.clone()),
            ("cus_email", customer.email.clone()),
            ("cus_add1", "Dhaka".to_string()),
            ("cus_city", "Dhaka".to_string()),
            ("cus_country", "Bangladesh".to_string()),
            ("cus_phone", phone),
            ("shipping_method", "NO".to_string()),
            ("product_name", request.product_name.clone()),
            ("product_category", "Tours".to_string()),
            ("product_profile", "non-physical-goods".to_string()),
            ("value_a", request.payment_id.as_uuid().to_string()),
            ("value_b", request.booking_id.as_uuid().to_string()),
        ];
        if let Some(ipn_url) = &self.settings.ipn_url {
            form.push(("ipn_url", ipn_url.clone()));
        }
        form
    }

    async fn post_session(&self, request: &SessionRequest) -> Result<SessionResponse, PortError> {
        let url = format!("{}{}", self.settings.base_url(), SESSION_PATH);
        let response = self
            .client
            .post(&url)
            .form(&self.session_form(request))
            .send()
            .await
            .map_err(|e| map_transport_error("initiate", self.settings.timeout_secs, e))?;
        let body = read_json(response).await?;

        let status = body.get("status").and_then(|s| s.as_str()).unwrap_or_default();
        if !status.eq_ignore_ascii_case("success") {
            let reason = body
                .get("failedreason")
                .and_then(|s| s.as_str())
                .unwrap_or("session refused")
                .to_string();
            return Err(PortError::validation(reason));
        }

        Ok(SessionResponse {
            redirect_url: string_field(&body, "GatewayPageURL"),
            session_key: string_field(&body, "sessionkey"),
            raw: body,
        })
    }

    async fn get_validation(&self, validation_id: &str) -> Result<ValidationResult, PortError> {
        let url = format!("{}{}", self.settings.base_url(), VALIDATION_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("val_id", validation_id),
                ("store_id", self.settings.store_id.as_str()),
                ("store_passwd", self.settings.store_password.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error("validate", self.settings.timeout_secs, e))?;
        let body = read_json(response).await?;

        Ok(ValidationResult {
            status: string_field(&body, "status").unwrap_or_default(),
            transaction_id: string_field(&body, "tran_id"),
            amount: decimal_field(&body, "amount"),
            currency: string_field(&body, "currency"),
            raw: body,
        })
    }
}

impl DomainPort for SslCommerzGateway {}

#[async_trait]
impl HealthCheckable for SslCommerzGateway {
    async fn health_check(&self) -> HealthCheckResult {
        if self.is_circuit_open().await {
            return HealthCheckResult::new("sslcommerz", AdapterHealth::Degraded, 0)
                .with_message("Circuit breaker is open");
        }
        HealthCheckResult::new("sslcommerz", AdapterHealth::Healthy, 0)
    }
}

#[async_trait]
impl PaymentGateway for SslCommerzGateway {
    fn name(&self) -> &'static str {
        "sslcommerz"
    }

    #[instrument(skip(self, request), fields(payment_id = %request.payment_id, amount = %request.amount))]
    async fn initiate(&self, request: &SessionRequest) -> Result<SessionResponse, PortError> {
        self.guard().await?;
        debug!("Opening gateway session");
        let result = self.post_session(request).await;
        self.observe(result).await
    }

    #[instrument(skip(self))]
    async fn validate(&self, validation_id: &str) -> Result<ValidationResult, PortError> {
        self.guard().await?;
        debug!("Validating notification");
        let result = self.get_validation(validation_id).await;
        self.observe(result).await
    }

    fn parse_notification(&self, fields: &HashMap<String, String>) -> GatewayNotification {
        notification_from_fields(fields)
    }
}

/// Reads SSLCommerz notification fields
///
/// `value_a` carries our payment id, `tran_id` the transaction reference,
/// `val_id` the validation handle and `status` the claimed outcome.
pub(crate) fn notification_from_fields(fields: &HashMap<String, String>) -> GatewayNotification {
    let get = |key: &str| fields.get(key).cloned();
    let raw = fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect::<serde_json::Map<_, _>>();

    GatewayNotification {
        payment_reference: get("value_a"),
        transaction_id: get("tran_id"),
        validation_id: get("val_id"),
        claimed_status: get("status"),
        raw: serde_json::Value::Object(raw),
    }
}

fn map_transport_error(operation: &str, timeout_secs: u64, err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        warn!(operation, "Gateway request timed out");
        return PortError::Timeout {
            operation: operation.to_string(),
            duration_ms: timeout_secs * 1000,
        };
    }
    PortError::connection_with_source(format!("gateway {} request failed", operation), err)
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, PortError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(PortError::ServiceUnavailable {
            service: format!("sslcommerz ({})", status),
        });
    }
    if !status.is_success() {
        return Err(PortError::internal(format!("gateway answered {}", status)));
    }
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| PortError::Transformation {
            message: format!("unreadable gateway response: {}", e),
        })
}

fn string_field(body: &serde_json::Value, key: &str) -> Option<String> {
    match body.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a decimal that the gateway may send as a string or a number
fn decimal_field(body: &serde_json::Value, key: &str) -> Option<Decimal> {
    string_field(body, key).and_then(|s| Decimal::from_str(s.trim()).ok())
}
