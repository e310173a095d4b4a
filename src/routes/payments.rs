// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider callback and intent status routes.
//!
//! The signed callback is the authoritative confirmation path in the
//! absence of the browser being trustworthy: MaishaPay (or the dev
//! simulator) posts the outcome with an HMAC over the raw body.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{PaymentStatus, Role};
use crate::AppState;

/// Signature header on provider callbacks.
const SIGNATURE_HEADER: &str = "x-maishapay-signature";

/// Public callback route.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/payments/callback", post(provider_callback))
}

/// Protected status route (auth middleware applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/payments/{reference}", get(get_payment_status))
}

/// Provider callback payload.
#[derive(Deserialize, Debug)]
struct CallbackEvent {
    reference: String,
    /// "completed" / "success" or "failed" / "cancelled"
    status: String,
    amount: Option<Decimal>,
}

/// Handle the signed provider callback (POST).
async fn provider_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !state.payments.verify_callback_signature(&body, signature) {
        tracing::warn!("Security Alert: payment callback signature mismatch");
        return StatusCode::FORBIDDEN;
    }

    let event: CallbackEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse payment callback");
            return StatusCode::OK; // Still return 200 to the provider to avoid retries
        }
    };

    tracing::info!(
        reference = %event.reference,
        status = %event.status,
        "Payment callback received"
    );

    let intent = match state.payments.read_outcome(&event.reference).await {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            tracing::warn!(reference = %event.reference, "Callback for unknown reference");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load intent for callback");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let completed = matches!(event.status.as_str(), "completed" | "success" | "paid");

    // A confirmation must match the charged amount exactly
    if completed {
        if let Some(amount) = event.amount {
            if amount.round_dp(2) != intent.amount.round_dp(2) {
                tracing::warn!(
                    reference = %event.reference,
                    intent_amount = %intent.amount,
                    callback_amount = %amount,
                    "Security Alert: callback amount mismatch, ignoring confirmation"
                );
                return StatusCode::OK;
            }
        }
    }

    if let Err(e) = state
        .payments
        .mark_outcome(&event.reference, completed)
        .await
    {
        tracing::error!(reference = %event.reference, error = %e, "Failed to mark outcome");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    // Always return 200 OK quickly once handled
    StatusCode::OK
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    pub reference: String,
    pub status: PaymentStatus,
    pub verified: bool,
    pub amount: Decimal,
    pub currency: String,
    pub created_at: String,
}

/// Read the state of a payment intent (owner or admin only).
async fn get_payment_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentStatusResponse>> {
    let intent = state
        .payments
        .read_outcome(&reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", reference)))?;

    // No identity may read another identity's intent
    if intent.user_id != user.user_id && user.role != Role::Admin {
        tracing::warn!(
            reference = %reference,
            acting_user = %user.user_id,
            "Security Alert: payment status read by a different identity"
        );
        return Err(AppError::NotFound(format!("Payment {} not found", reference)));
    }

    Ok(Json(PaymentStatusResponse {
        reference: intent.reference,
        status: intent.status,
        verified: intent.verified,
        amount: intent.amount,
        currency: intent.currency,
        created_at: intent.created_at,
    }))
}
