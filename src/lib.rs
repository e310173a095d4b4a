// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! BookOS: digital-bookstore storefront API
//!
//! This crate provides the backend API for the BookOS store: catalogue
//! browsing, the two-tier cart, MaishaPay hosted-checkout orchestration,
//! purchase fulfillment (download access) and the admin back-office.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{
    AuthService, CartService, CheckoutService, DownloadService, PaymentService, PurchaseLedger,
    StorageClient,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub auth: AuthService,
    pub cart: CartService,
    pub ledger: PurchaseLedger,
    pub payments: PaymentService,
    pub checkout: CheckoutService,
    pub downloads: DownloadService,
    pub storage: StorageClient,
}
