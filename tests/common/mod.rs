// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use bookos_api::config::Config;
use bookos_api::db::FirestoreDb;
use bookos_api::models::{Role, UserAccount};
use bookos_api::routes::create_router;
use bookos_api::services::{
    AuthService, CartService, CheckoutService, DownloadService, MaishaPayClient, PaymentService,
    PurchaseLedger, StorageClient,
};
use bookos_api::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Build the full service stack over a given database.
#[allow(dead_code)]
pub fn build_state(config: Config, db: FirestoreDb) -> Arc<AppState> {
    let provider = MaishaPayClient::new(
        config.maishapay_base_url.clone(),
        config.maishapay_api_key.clone(),
        config.maishapay_secret_key.clone(),
        config.frontend_url.clone(),
        config.maishapay_simulate,
    );
    let storage = StorageClient::new_mock(&config.storage_bucket);

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

    Arc::new(AppState {
        config,
        db,
        auth,
        cart,
        ledger,
        payments,
        checkout,
        downloads,
        storage,
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = build_state(Config::test_default(), test_db_offline());
    (create_router(state.clone()), state)
}

/// A user account for tests.
#[allow(dead_code)]
pub fn test_user(id: &str, role: Role) -> UserAccount {
    UserAccount {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        name: Some("Test User".to_string()),
        role,
        credits: "10000".parse().unwrap(),
        disabled: false,
        created_at: chrono::Utc::now().to_rfc3339(),
        updated_at: None,
    }
}

/// Create a session token for a test user.
#[allow(dead_code)]
pub fn auth_token(user: &UserAccount, signing_key: &[u8]) -> String {
    bookos_api::middleware::auth::create_jwt(user, signing_key).expect("JWT creation failed")
}
