// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod fulfillment;
pub mod ledger;
pub mod maishapay;
pub mod payments;
pub mod storage;

pub use auth::AuthService;
pub use cart::{CartOwner, CartService};
pub use checkout::{CheckoutService, FinalState, FinalizeOutcome, InitiateOutcome, ReturnParams};
pub use fulfillment::DownloadService;
pub use ledger::{CartValidation, PurchaseLedger};
pub use maishapay::MaishaPayClient;
pub use payments::PaymentService;
pub use storage::StorageClient;
