// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! BookOS API Server
//!
//! Digital-bookstore storefront backend: catalogue, two-tier cart,
//! MaishaPay hosted checkout, purchase fulfillment and admin back-office.

use bookos_api::{
    config::Config,
    db::FirestoreDb,
    services::{
        AuthService, CartService, CheckoutService, DownloadService, MaishaPayClient,
        PaymentService, PurchaseLedger, StorageClient,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting BookOS API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize blob storage
    let storage = StorageClient::new(&config.storage_bucket);
    tracing::info!(bucket = %config.storage_bucket, "Storage client initialized");

    // Initialize the MaishaPay client
    let provider = MaishaPayClient::new(
        config.maishapay_base_url.clone(),
        config.maishapay_api_key.clone(),
        config.maishapay_secret_key.clone(),
        config.frontend_url.clone(),
        config.maishapay_simulate,
    );
    if config.maishapay_simulate {
        tracing::warn!("MaishaPay simulator mode enabled; do not use in production");
    }

    // Assemble services
    let auth = AuthService::new(db.clone());
    let cart = CartService::new(db.clone());
    let ledger = PurchaseLedger::new(db.clone());
    let payments = PaymentService::new(db.clone(), provider, config.currency.clone());
    let checkout = CheckoutService::new(
        db.clone(),
        cart.clone(),
        ledger.clone(),
        payments.clone(),
        config.tax_rate,
        config.pending_intent_ttl_hours,
    );
    let downloads = DownloadService::new(db.clone(), ledger.clone(), storage.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
        cart,
        ledger,
        payments,
        checkout,
        downloads,
        storage,
    });

    // Build router
    let app = bookos_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bookos_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
