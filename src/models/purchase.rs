// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase ledger model.
//!
//! The existence of a `PurchaseRecord` for `(user, book)` is the sole
//! authorization proof for downloading that book.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deterministic composite document ID for the purchase ledger.
///
/// Used uniformly as the upsert identity, which is what makes repeated
/// fulfillment of the same payment safe: writes are upserts keyed by this
/// identity, never inserts.
pub fn purchase_key(user_id: &str, book_id: &str) -> String {
    format!("{}_{}", user_id, book_id)
}

/// One purchased book, stored at `purchases/{user_id}_{book_id}`.
/// Created exactly once at finalization, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub user_id: String,
    pub book_id: String,
    pub title: String,
    /// Price captured from the payment intent snapshot
    pub price: Decimal,
    /// Reference of the payment that granted this purchase
    pub payment_ref: String,
    /// When the purchase was recorded (ISO 8601)
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_key_is_deterministic() {
        assert_eq!(purchase_key("u1", "42"), "u1_42");
        assert_eq!(purchase_key("u1", "42"), purchase_key("u1", "42"));
    }

    #[test]
    fn test_purchase_key_separates_users() {
        assert_ne!(purchase_key("u1", "42"), purchase_key("u2", "42"));
        assert_ne!(purchase_key("u1", "42"), purchase_key("u1", "43"));
    }
}
