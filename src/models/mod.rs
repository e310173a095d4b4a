// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod book;
pub mod cart;
pub mod payment;
pub mod purchase;
pub mod user;

pub use book::Book;
pub use cart::{CartEntry, CartItem};
pub use payment::{PaymentIntent, PaymentItem, PaymentStatus};
pub use purchase::{purchase_key, PurchaseRecord};
pub use user::{Credential, Role, UserAccount};
