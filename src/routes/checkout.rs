// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout routes: initiate a payment, finalize on return navigation.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::checkout::{FinalState, InitiateOutcome, ReturnParams};
use crate::AppState;

/// Protected checkout routes (auth middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/checkout", post(initiate))
        .route("/api/checkout/callback", get(finalize))
}

#[derive(Serialize)]
pub struct InitiateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Hosted payment page to navigate to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Book ids already owned, when success is false
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_ids: Vec<String>,
}

/// Start a checkout for the current cart.
async fn initiate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<InitiateResponse>> {
    let account = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    match state.checkout.initiate(&account).await? {
        InitiateOutcome::Redirect {
            reference,
            checkout_url,
        } => Ok(Json(InitiateResponse {
            success: true,
            reference: Some(reference),
            redirect_url: Some(checkout_url),
            blocked_ids: Vec::new(),
        })),
        InitiateOutcome::Blocked { blocked_ids } => Ok(Json(InitiateResponse {
            success: false,
            reference: None,
            redirect_url: None,
            blocked_ids,
        })),
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    /// Provider reference; read defensively across the aliases providers use
    reference: Option<String>,
    #[serde(rename = "ref")]
    reference_alias: Option<String>,
    transaction_ref: Option<String>,
    #[serde(rename = "orderId")]
    order_id: Option<String>,

    status: Option<String>,
    payment_status: Option<String>,
    amount: Option<String>,
}

impl CallbackQuery {
    fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or(self.reference_alias.as_deref())
            .or(self.transaction_ref.as_deref())
            .or(self.order_id.as_deref())
    }

    fn return_params(&self) -> ReturnParams {
        ReturnParams {
            status: self.status.clone().or_else(|| self.payment_status.clone()),
            amount: self.amount.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct FinalizeResponse {
    pub state: FinalState,
    pub message: String,
}

/// Finalize a payment when control returns from the provider.
///
/// Safe to invoke repeatedly for the same reference.
async fn finalize(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<FinalizeResponse>> {
    let Some(reference) = query.reference() else {
        return Ok(Json(FinalizeResponse {
            state: FinalState::Failed,
            message: "Missing transaction reference".to_string(),
        }));
    };

    let outcome = state
        .checkout
        .finalize(&user.user_id, reference, &query.return_params())
        .await;

    Ok(Json(FinalizeResponse {
        state: outcome.state,
        message: outcome.message,
    }))
}
