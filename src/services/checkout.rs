// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout orchestration.
//!
//! Handles the two-phase workflow:
//! 1. `initiate`: validate the cart against the ledger, price it, persist a
//!    pending intent and hand out the hosted-checkout redirect URL
//! 2. `finalize`: on return navigation, re-validate the intent (ownership,
//!    amount integrity, confirmation state) and fulfill it
//!
//! `finalize` must be safe to invoke any number of times: the return URL is
//! an arbitrary browser navigation that can be replayed, bookmarked or
//! tampered with. Fulfillment is one atomic batch guarded by the intent's
//! `fulfilled_at` stamp, so replays short-circuit to `Success` without
//! re-applying side effects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{CartItem, PaymentItem, PaymentStatus, UserAccount};
use crate::services::cart::{CartOwner, CartService};
use crate::services::ledger::PurchaseLedger;
use crate::services::payments::PaymentService;

/// Priced cart: subtotal, tax at the configured rate, grand total.
#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    /// Rounded to the currency minor unit; this is the charged amount
    pub total: Decimal,
}

/// Outcome of `initiate`.
#[derive(Debug, Clone)]
pub enum InitiateOutcome {
    /// Hand control to the hosted payment page
    Redirect {
        reference: String,
        checkout_url: String,
    },
    /// One or more cart items are already owned; nothing was charged
    Blocked { blocked_ids: Vec<String> },
}

/// Query parameters carried back by the provider's return navigation.
/// Names are provider-specific, so everything is optional and untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnParams {
    pub status: Option<String>,
    pub amount: Option<String>,
}

/// Terminal report of a finalize invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalState {
    Success,
    Processing,
    Failed,
}

/// What finalize tells the caller.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub state: FinalState,
    pub message: String,
}

impl FinalizeOutcome {
    fn success(message: &str) -> Self {
        Self {
            state: FinalState::Success,
            message: message.to_string(),
        }
    }

    fn processing(message: &str) -> Self {
        Self {
            state: FinalState::Processing,
            message: message.to_string(),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            state: FinalState::Failed,
            message: message.to_string(),
        }
    }
}

/// Composes the cart store, purchase ledger and payment gateway.
#[derive(Clone)]
pub struct CheckoutService {
    db: FirestoreDb,
    cart: CartService,
    ledger: PurchaseLedger,
    payments: PaymentService,
    tax_rate: Decimal,
    pending_intent_ttl_hours: i64,
}

impl CheckoutService {
    pub fn new(
        db: FirestoreDb,
        cart: CartService,
        ledger: PurchaseLedger,
        payments: PaymentService,
        tax_rate: Decimal,
        pending_intent_ttl_hours: i64,
    ) -> Self {
        Self {
            db,
            cart,
            ledger,
            payments,
            tax_rate,
            pending_intent_ttl_hours,
        }
    }

    /// Start a checkout: pre-flight the cart, price it, create the intent.
    ///
    /// Item prices are snapshotted into the intent here; later catalogue
    /// changes never affect an in-flight payment.
    pub async fn initiate(&self, user: &UserAccount) -> Result<InitiateOutcome, AppError> {
        let owner = CartOwner::User(user.id.clone());
        let items = self.cart.items(&owner).await?;

        if items.is_empty() {
            return Err(AppError::BadRequest("Cart is empty".to_string()));
        }

        let validation = self.ledger.validate_cart(&user.id, &items).await?;
        if !validation.ok {
            tracing::info!(
                user_id = %user.id,
                blocked = ?validation.blocked_ids,
                "Checkout blocked: items already owned"
            );
            return Ok(InitiateOutcome::Blocked {
                blocked_ids: validation.blocked_ids,
            });
        }

        let totals = compute_totals(&items, self.tax_rate);
        let snapshot: Vec<PaymentItem> = items
            .iter()
            .map(|item| PaymentItem {
                book_id: item.id.clone(),
                title: item.title.clone(),
                price: item.price,
            })
            .collect();

        let initiated = self
            .payments
            .create_intent(user, totals.total, snapshot)
            .await?;

        tracing::info!(
            user_id = %user.id,
            reference = %initiated.reference,
            total = %totals.total,
            "Checkout initiated"
        );

        Ok(InitiateOutcome::Redirect {
            reference: initiated.reference,
            checkout_url: initiated.checkout_url,
        })
    }

    /// Reconcile a returned payment signal into a durable purchase grant.
    ///
    /// Never leaves a half-applied state from the caller's perspective: any
    /// error inside the pipeline is caught and reported as `Failed`.
    pub async fn finalize(
        &self,
        user_id: &str,
        reference: &str,
        params: &ReturnParams,
    ) -> FinalizeOutcome {
        match self.try_finalize(user_id, reference, params).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(reference, error = %e, "Finalize failed internally");
                FinalizeOutcome::failed("An error occurred while validating the payment")
            }
        }
    }

    async fn try_finalize(
        &self,
        user_id: &str,
        reference: &str,
        params: &ReturnParams,
    ) -> Result<FinalizeOutcome, AppError> {
        // 1. Resolve the intent
        let Some(intent) = self.payments.read_outcome(reference).await? else {
            return Ok(FinalizeOutcome::failed("Transaction not found"));
        };

        // 2. The intent must belong to the acting identity
        if intent.user_id != user_id {
            tracing::warn!(
                reference,
                intent_user = %intent.user_id,
                acting_user = %user_id,
                "Security Alert: finalize attempted by a different identity"
            );
            return Ok(FinalizeOutcome::failed("Not authorized for this transaction"));
        }

        // 3. Amount integrity: a tampered return link must never grant access
        if let Some(raw) = params.amount.as_deref() {
            let matches = raw
                .parse::<Decimal>()
                .map(|amount| amount.round_dp(2) == intent.amount.round_dp(2))
                .unwrap_or(false);
            if !matches {
                tracing::warn!(
                    reference,
                    claimed = raw,
                    expected = %intent.amount,
                    "Security Alert: amount mismatch on finalize"
                );
                return Ok(FinalizeOutcome::failed("Invalid amount for this transaction"));
            }
        }

        // 4. Not confirmed yet: reconcile against the provider, do not fulfill
        let intent = if intent.is_confirmed() {
            intent
        } else {
            let fresh = self
                .payments
                .reconcile(intent, self.pending_intent_ttl_hours)
                .await?;

            if !fresh.is_confirmed() {
                return Ok(match fresh.status {
                    PaymentStatus::Failed => FinalizeOutcome::failed("Payment failed"),
                    _ if params.status.as_deref() == Some("success") => {
                        FinalizeOutcome::processing("Payment received, verification in progress")
                    }
                    _ => FinalizeOutcome::processing("Payment pending verification"),
                });
            }
            fresh
        };

        // 5. Confirmed: grant the purchases from the intent snapshot
        if intent.items.is_empty() {
            return Ok(FinalizeOutcome::failed("No books associated with this transaction"));
        }

        let newly_fulfilled = self.db.fulfill_payment_atomic(reference).await?;

        if newly_fulfilled {
            // Best-effort bookkeeping after the atomic grant. Failures here
            // must never revoke the purchase.
            if let Err(e) = self.db.adjust_credits(&intent.user_id, -intent.amount).await {
                tracing::warn!(reference, error = %e, "Credit decrement failed");
            }

            let purchased_ids: Vec<String> =
                intent.items.iter().map(|i| i.book_id.clone()).collect();
            if let Err(e) = self.cart.clear_purchased(&intent.user_id, &purchased_ids).await {
                tracing::warn!(reference, error = %e, "Post-purchase cart clear failed");
            }
        }

        Ok(FinalizeOutcome::success("Payment confirmed, your books are available"))
    }
}

/// Price a set of cart items: tax applies to the subtotal, and the grand
/// total is rounded to the currency minor unit.
pub fn compute_totals(items: &[CartItem], tax_rate: Decimal) -> Totals {
    let subtotal: Decimal = items.iter().map(|i| i.price).sum();
    let tax = subtotal * tax_rate;
    let total = (subtotal + tax).round_dp(2);

    Totals {
        subtotal,
        tax,
        total,
    }
}
