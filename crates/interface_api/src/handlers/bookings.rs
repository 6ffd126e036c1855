//! Booking handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::{BookingId, ParticipantId};
use domain_payments::{Actor, BookingChannel};
use uuid::Uuid;
use validator::Validate;

use crate::dto::bookings::*;
use crate::{error::ApiError, AppState};

/// Opens the booking for a participation, or returns the existing one
pub async fn open_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<OpenBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    request.validate()?;

    let channel = match request.payment_method.as_deref() {
        None => BookingChannel::Online,
        Some(name) => BookingChannel::parse(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown payment method: {}", name)))?,
    };

    let opened = state
        .engine
        .open_booking(ParticipantId::from_uuid(request.participant), channel, &actor)
        .await?;

    let status = if opened.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(BookingResponse::from(&opened.booking))))
}

/// Gets a booking with its payments
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let statement = state.engine.booking(BookingId::from_uuid(id), &actor).await?;
    Ok(Json(BookingResponse::from(&statement)))
}

/// Marks a fully collected booking as paid
pub async fn verify_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .engine
        .verify_booking(BookingId::from_uuid(id), &actor)
        .await?;
    Ok(Json(BookingResponse::from(&booking)))
}
