//! Gateway callback handlers
//!
//! Both endpoints are called without a token: the IPN by the gateway's
//! servers, the redirect by the tourist's browser. Fields may arrive in the
//! query string, a form body, or both.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Form, Json,
};
use domain_payments::IpnOutcome;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::dto::payments::IpnResponse;
use crate::{error::ApiError, AppState};

type Fields = HashMap<String, String>;

/// IPN delivered as a GET
pub async fn ipn_query(
    State(state): State<AppState>,
    Query(fields): Query<Fields>,
) -> Result<Json<IpnResponse>, ApiError> {
    process_ipn(&state, fields).await
}

/// IPN delivered as a form POST
pub async fn ipn_form(
    State(state): State<AppState>,
    Query(mut fields): Query<Fields>,
    Form(form): Form<Fields>,
) -> Result<Json<IpnResponse>, ApiError> {
    fields.extend(form);
    process_ipn(&state, fields).await
}

async fn process_ipn(state: &AppState, fields: Fields) -> Result<Json<IpnResponse>, ApiError> {
    let outcome = state.ipn.handle(&fields).await.map_err(|e| {
        warn!(error = %e, retryable = e.is_retryable(), "IPN not processed");
        ApiError::from(e)
    })?;

    let status = match &outcome {
        IpnOutcome::Settled(_) => "processed",
        IpnOutcome::AlreadyProcessed(_) => "already_processed",
        IpnOutcome::Rejected { payment, reason } => {
            warn!(payment_id = %payment.id, reason = %reason, "IPN rejected");
            return Err(ApiError::BadRequest(reason.clone()));
        }
    };

    let payment = outcome.payment();
    info!(payment_id = %payment.id, outcome = status, "IPN acknowledged");
    Ok(Json(IpnResponse {
        status,
        payment_id: *payment.id.as_uuid(),
        payment_status: payment.status.as_str().to_string(),
    }))
}

/// Checkout redirect as a GET
pub async fn success_query(
    State(state): State<AppState>,
    Query(fields): Query<Fields>,
) -> Redirect {
    redirect(&state, fields).await
}

/// Checkout redirect as a form POST
pub async fn success_form(
    State(state): State<AppState>,
    Query(mut fields): Query<Fields>,
    Form(form): Form<Fields>,
) -> Redirect {
    fields.extend(form);
    redirect(&state, fields).await
}

async fn redirect(state: &AppState, fields: Fields) -> Redirect {
    let outcome = state.ipn.handle_redirect(&fields).await;
    Redirect::to(&state.config.frontend_location(&outcome.frontend_path()))
}
