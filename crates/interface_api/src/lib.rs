//! HTTP API Layer
//!
//! This crate provides the REST API for the tour payments core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: payments, bookings, gateway callbacks, health
//! - **Middleware**: Authentication, tracing, request ids, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! Authenticated routes live under `/api/v1`. The gateway's notification
//! and checkout redirect endpoints live under `/payments` and take no token.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(engine, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    http::HeaderName,
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_payments::{IpnHandler, ReconciliationEngine};

use crate::config::ApiConfig;
use crate::handlers::{bookings, gateway, health, payments};
use crate::middleware::{audit_middleware, auth_middleware, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub ipn: Arc<IpnHandler>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `engine` - Reconciliation engine wired to a ledger store and gateway
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(engine: Arc<ReconciliationEngine>, config: ApiConfig) -> Router {
    let ipn = Arc::new(IpnHandler::new(engine.clone()));
    let state = AppState { engine, ipn, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Gateway callbacks (no auth; validated against the gateway instead)
    let gateway_routes = Router::new()
        .route("/ipn", get(gateway::ipn_query).post(gateway::ipn_form))
        .route("/success", get(gateway::success_query).post(gateway::success_form));

    // Payment routes
    let payment_routes = Router::new()
        .route("/initiate", post(payments::initiate_payment))
        .route("/cash", post(payments::record_cash_payment))
        .route("/:id", get(payments::get_payment))
        .route("/:id/verify", patch(payments::verify_payment));

    // Booking routes
    let booking_routes = Router::new()
        .route("/", post(bookings::open_booking))
        .route("/:id", get(bookings::get_booking))
        .route("/:id/verify", patch(bookings::verify_booking));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/payments", payment_routes)
        .nest("/bookings", booking_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/payments", gateway_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
