// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment gateway adapter.
//!
//! Creates pending payment intents (persisted before any redirect), reads
//! outcomes back, and applies the `Pending -> Completed/Failed` transition.
//! The transition only ever comes from an authoritative source: the signed
//! provider callback or a server-to-provider status poll. Return-URL
//! parameters never flip an intent by themselves.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{PaymentIntent, PaymentItem, PaymentStatus, UserAccount};
use crate::services::maishapay::MaishaPayClient;

/// Result of intent creation: where to send the shopper.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub reference: String,
    pub checkout_url: String,
}

/// Gateway adapter over the intent store and the MaishaPay client.
#[derive(Clone)]
pub struct PaymentService {
    db: FirestoreDb,
    provider: MaishaPayClient,
    currency: String,
}

impl PaymentService {
    pub fn new(db: FirestoreDb, provider: MaishaPayClient, currency: String) -> Self {
        Self {
            db,
            provider,
            currency,
        }
    }

    /// Generate a payment reference: millisecond timestamp plus a fragment
    /// of the user id, unique enough to never collide in practice.
    pub fn generate_reference(user_id: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        let fragment: String = user_id.chars().take(8).collect();
        format!("PAY_{}_{}", millis, fragment)
    }

    /// Create and persist a `Pending` intent, then derive the redirect URL.
    ///
    /// The intent is written with a create (never an upsert) *before* the
    /// provider is contacted: an abandoned hosted page still leaves an
    /// auditable trail, and no redirect is ever handed out without a
    /// persisted intent behind it.
    pub async fn create_intent(
        &self,
        user: &UserAccount,
        amount: Decimal,
        items: Vec<PaymentItem>,
    ) -> Result<InitiatedPayment, AppError> {
        let reference = Self::generate_reference(&user.id);

        let intent = PaymentIntent {
            reference: reference.clone(),
            user_id: user.id.clone(),
            user_email: user.email.clone(),
            amount,
            currency: self.currency.clone(),
            status: PaymentStatus::Pending,
            verified: false,
            items,
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
            fulfilled_at: None,
        };

        self.db.create_payment(&intent).await?;

        let customer_name = user.name.clone().unwrap_or_else(|| user.email.clone());
        let session = self.provider.create_checkout(&intent, &customer_name).await?;

        tracing::info!(
            reference = %reference,
            user_id = %user.id,
            amount = %amount,
            items = intent.items.len(),
            "Payment intent created"
        );

        Ok(InitiatedPayment {
            reference,
            checkout_url: session.checkout_url,
        })
    }

    /// Fetch the current state of a previously created intent.
    pub async fn read_outcome(&self, reference: &str) -> Result<Option<PaymentIntent>, AppError> {
        self.db.get_payment(reference).await
    }

    /// Verify a provider callback signature (HMAC over the raw body).
    pub fn verify_callback_signature(&self, payload: &[u8], signature: &str) -> bool {
        self.provider.verify_callback_signature(payload, signature)
    }

    /// Transition a `Pending` intent to `Completed` or `Failed`.
    /// Terminal states absorb replays.
    pub async fn mark_outcome(
        &self,
        reference: &str,
        completed: bool,
    ) -> Result<PaymentIntent, AppError> {
        let status = if completed {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        self.db.update_payment_status(reference, status, completed).await
    }

    /// Reconcile a `Pending` intent against the provider.
    ///
    /// Expired intents are failed lazily here. Otherwise the provider is
    /// polled and its answer alone decides the transition; client-supplied
    /// status never does. Transient provider failures leave the intent
    /// pending.
    pub async fn reconcile(
        &self,
        intent: PaymentIntent,
        ttl_hours: i64,
    ) -> Result<PaymentIntent, AppError> {
        if intent.status.is_terminal() {
            return Ok(intent);
        }

        if intent_expired(&intent, ttl_hours) {
            tracing::info!(reference = %intent.reference, "Pending intent expired");
            return self.mark_outcome(&intent.reference, false).await;
        }

        let provider_status = match self.provider.fetch_status(&intent.reference).await {
            Ok(status) => status,
            Err(AppError::NotFound(_)) => return Ok(intent),
            Err(e) => {
                tracing::warn!(
                    reference = %intent.reference,
                    error = %e,
                    "Provider status poll failed, leaving intent pending"
                );
                return Ok(intent);
            }
        };

        match provider_status.status.as_str() {
            "completed" | "success" | "paid" => {
                // The provider-reported charge must match the intent exactly
                if let Some(amount) = provider_status.amount {
                    if amount.round_dp(2) != intent.amount.round_dp(2) {
                        tracing::warn!(
                            reference = %intent.reference,
                            intent_amount = %intent.amount,
                            provider_amount = %amount,
                            "Security Alert: provider-reported amount mismatch"
                        );
                        return Ok(intent);
                    }
                }
                self.mark_outcome(&intent.reference, true).await
            }
            "failed" | "cancelled" | "canceled" => {
                self.mark_outcome(&intent.reference, false).await
            }
            _ => Ok(intent),
        }
    }
}

/// Whether a pending intent has outlived the configured TTL.
fn intent_expired(intent: &PaymentIntent, ttl_hours: i64) -> bool {
    match DateTime::parse_from_rfc3339(&intent.created_at) {
        Ok(created) => Utc::now() - created.with_timezone(&Utc) > Duration::hours(ttl_hours),
        Err(_) => {
            tracing::warn!(
                reference = %intent.reference,
                created_at = %intent.created_at,
                "Unparseable intent timestamp, treating as not expired"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_intent(created_at: &str) -> PaymentIntent {
        PaymentIntent {
            reference: "PAY_1_user1234".to_string(),
            user_id: "user1234abcd".to_string(),
            user_email: "u@example.com".to_string(),
            amount: "15.59".parse().unwrap(),
            currency: "EUR".to_string(),
            status: PaymentStatus::Pending,
            verified: false,
            items: vec![],
            created_at: created_at.to_string(),
            updated_at: None,
            fulfilled_at: None,
        }
    }

    #[test]
    fn test_generate_reference_format() {
        let reference = PaymentService::generate_reference("user1234abcdef");
        assert!(reference.starts_with("PAY_"));
        assert!(reference.ends_with("_user1234"));
    }

    #[test]
    fn test_generate_reference_short_user_id() {
        let reference = PaymentService::generate_reference("u1");
        assert!(reference.ends_with("_u1"));
    }

    #[test]
    fn test_intent_expired_old_timestamp() {
        let intent = pending_intent("2020-01-01T00:00:00Z");
        assert!(intent_expired(&intent, 24));
    }

    #[test]
    fn test_intent_expired_fresh_timestamp() {
        let intent = pending_intent(&Utc::now().to_rfc3339());
        assert!(!intent_expired(&intent, 24));
    }

    #[test]
    fn test_intent_expired_unparseable_timestamp() {
        let intent = pending_intent("not-a-date");
        assert!(!intent_expired(&intent, 24));
    }
}
