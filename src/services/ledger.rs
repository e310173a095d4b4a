// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase ledger service.
//!
//! The single source of truth for "has this user bought this book". All
//! writes go through idempotent upserts keyed by the deterministic
//! composite purchase key.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{CartItem, PaymentItem, PurchaseRecord};

/// Result of the pre-flight check run before money moves.
#[derive(Debug, Clone)]
pub struct CartValidation {
    /// True iff no cart item is already owned
    pub ok: bool,
    /// Book ids the user already owns
    pub blocked_ids: Vec<String>,
}

/// Queries and writes over the purchase ledger.
#[derive(Clone)]
pub struct PurchaseLedger {
    db: FirestoreDb,
}

impl PurchaseLedger {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Existence check on the composite key. Callers must not cache the
    /// answer; the gate in fulfillment re-asks on every request.
    pub async fn has_purchased(&self, user_id: &str, book_id: &str) -> Result<bool, AppError> {
        self.db.has_purchased(user_id, book_id).await
    }

    /// Check every cart item against the ledger concurrently.
    pub async fn validate_cart(
        &self,
        user_id: &str,
        items: &[CartItem],
    ) -> Result<CartValidation, AppError> {
        let book_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let blocked_ids = self.db.purchased_subset(user_id, &book_ids).await?;

        Ok(CartValidation {
            ok: blocked_ids.is_empty(),
            blocked_ids,
        })
    }

    /// Atomically upsert one purchase record per item. Safe to re-invoke
    /// with the same items.
    pub async fn record_purchases(
        &self,
        user_id: &str,
        items: &[PaymentItem],
        payment_ref: &str,
    ) -> Result<(), AppError> {
        self.db.record_purchases(user_id, items, payment_ref).await
    }

    /// All purchases for a user, newest first.
    pub async fn purchases_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PurchaseRecord>, AppError> {
        self.db.purchases_for_user(user_id).await
    }
}
