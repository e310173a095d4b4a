// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MaishaPay API client for hosted-checkout payments.
//!
//! Handles:
//! - Hosted checkout session creation (outbound redirect URL)
//! - Server-to-server payment status polls
//! - Callback signature verification (HMAC-SHA256 over the raw body)
//! - Development-mode simulator URLs (no provider credentials needed)

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::models::PaymentIntent;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// MaishaPay API client.
#[derive(Clone)]
pub struct MaishaPayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    /// Frontend base URL for callback/cancel/simulator pages
    frontend_url: String,
    /// Development mode: hand out simulator URLs instead of calling the API
    simulate: bool,
}

/// A created hosted-checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
}

/// Provider-reported state of a payment, from the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPaymentStatus {
    pub reference: String,
    pub status: String,
    /// Amount as charged by the provider, when reported
    pub amount: Option<Decimal>,
}

#[derive(Deserialize)]
struct CheckoutResponse {
    checkout_url: String,
}

impl MaishaPayClient {
    pub fn new(
        base_url: String,
        api_key: String,
        secret_key: String,
        frontend_url: String,
        simulate: bool,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            secret_key,
            frontend_url,
            simulate,
        }
    }

    /// Create a hosted checkout session for a persisted intent and return
    /// the URL to hand control to.
    pub async fn create_checkout(
        &self,
        intent: &PaymentIntent,
        customer_name: &str,
    ) -> Result<CheckoutSession, AppError> {
        if self.simulate {
            let url = format!(
                "{}/payment/simulator?reference={}&amount={}&email={}",
                self.frontend_url,
                intent.reference,
                intent.amount.round_dp(2),
                urlencoding::encode(&intent.user_email),
            );
            tracing::info!(
                reference = %intent.reference,
                amount = %intent.amount,
                "Checkout session created (simulator mode)"
            );
            return Ok(CheckoutSession { checkout_url: url });
        }

        let callback_url = format!(
            "{}/payment/callback?reference={}",
            self.frontend_url, intent.reference
        );
        let cancel_url = format!("{}/cart", self.frontend_url);

        let body = serde_json::json!({
            "amount": intent.amount.round_dp(2).to_string(),
            "currency": intent.currency,
            "reference": intent.reference,
            "description": format!("Purchase of {} book(s)", intent.items.len()),
            "customer_email": intent.user_email,
            "customer_name": customer_name,
            "callback_url": callback_url,
            "cancel_url": cancel_url,
            "items": intent.items.iter().map(|item| {
                serde_json::json!({
                    "name": item.title,
                    "quantity": 1,
                    "price": item.price.round_dp(2).to_string(),
                })
            }).collect::<Vec<_>>(),
        });

        let response = self
            .http
            .post(format!("{}/v1/checkout", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(e.to_string()))?;

        let parsed: CheckoutResponse = self.check_response_json(response).await?;
        Ok(CheckoutSession {
            checkout_url: parsed.checkout_url,
        })
    }

    /// Fetch the authoritative state of a payment from the provider.
    pub async fn fetch_status(&self, reference: &str) -> Result<ProviderPaymentStatus, AppError> {
        if self.simulate {
            // The simulator confirms through the signed callback endpoint,
            // so polls always come back pending.
            return Ok(ProviderPaymentStatus {
                reference: reference.to_string(),
                status: "pending".to_string(),
                amount: None,
            });
        }

        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, reference))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(AppError::NotFound(format!(
                "Payment {} not known to provider",
                reference
            )));
        }

        self.check_response_json(response).await
    }

    /// Verify the HMAC-SHA256 signature of a provider callback.
    ///
    /// The signature is a hex digest of the raw request body keyed with the
    /// merchant secret. Comparison is constant-time.
    pub fn verify_callback_signature(&self, payload: &[u8], signature_hex: &str) -> bool {
        let Ok(provided) = hex::decode(signature_hex.trim()) else {
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        expected.ct_eq(provided.as_slice()).into()
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::PaymentProvider(
                    "Invalid MaishaPay API key".to_string(),
                ));
            }

            return Err(AppError::PaymentProvider(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("JSON parse error: {}", e)))
    }
}
