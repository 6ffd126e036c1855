//! Payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::{BookingId, Currency, Money, PaymentId};
use domain_payments::{Actor, PaymentMethod};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::payments::*;
use crate::{error::ApiError, AppState};

fn amount(state: &AppState, amount: rust_decimal::Decimal, currency: Option<Currency>) -> Money {
    Money::new(amount, currency.unwrap_or_else(|| state.engine.currency()))
}

/// Starts an online payment and returns the gateway checkout session
pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<InitiatePaymentResponse>), ApiError> {
    request.validate()?;

    let method = match request.method.as_deref() {
        None => PaymentMethod::Gateway,
        Some(name) => PaymentMethod::parse(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown payment method: {}", name)))?,
    };

    let initiated = state
        .engine
        .initiate_gateway_payment(
            BookingId::from_uuid(request.booking),
            amount(&state, request.amount, request.currency),
            method,
            &actor,
        )
        .await?;

    info!(
        payment_id = %initiated.payment.id,
        booking_id = %initiated.payment.booking_id,
        "Gateway session opened"
    );

    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponse {
            payment_id: *initiated.payment.id.as_uuid(),
            gateway_session: GatewaySessionResponse::from(&initiated.session),
            payment: PaymentResponse::from(&initiated.payment),
        }),
    ))
}

/// Records cash collected by the tour's organizer
pub async fn record_cash_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CashPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    request.validate()?;

    let outcome = state
        .engine
        .create_cash_payment(
            BookingId::from_uuid(request.booking),
            amount(&state, request.amount, request.currency),
            &actor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(&outcome.payment))))
}

/// Settles a payment by hand
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let outcome = state
        .engine
        .verify_payment(PaymentId::from_uuid(id), &actor)
        .await?;

    Ok(Json(PaymentResponse::from(&outcome.payment)))
}

/// Gets a payment by ID
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.engine.payment(PaymentId::from_uuid(id), &actor).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}
