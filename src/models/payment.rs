// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment intent models.
//!
//! A `PaymentIntent` is the provider-facing record of an attempted payment,
//! persisted in `Pending` state before any redirect so an abandoned hosted
//! checkout still leaves an auditable trail.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of a payment intent. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Terminal states absorb any further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

/// One line of the cart snapshot captured at intent creation.
/// Later catalogue price changes never affect an in-flight intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentItem {
    pub book_id: String,
    pub title: String,
    pub price: Decimal,
}

/// Payment intent, stored at `payments/{reference}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Caller-generated globally-unique reference (also the document ID)
    pub reference: String,
    pub user_id: String,
    pub user_email: String,
    /// Total charged, rounded to the currency minor unit
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    /// Set only by an authoritative confirmation (signed callback or
    /// server-to-provider poll), never from the return URL
    pub verified: bool,
    pub items: Vec<PaymentItem>,
    /// When the intent was created (ISO 8601)
    pub created_at: String,
    /// Last status transition (ISO 8601)
    pub updated_at: Option<String>,
    /// Stamped atomically with the purchase-record batch; guards replayed
    /// finalization from double-applying side effects
    pub fulfilled_at: Option<String>,
}

impl PaymentIntent {
    /// True once the intent may grant access: terminal success and verified.
    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Completed && self.verified
    }
}
