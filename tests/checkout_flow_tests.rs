// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end checkout flow tests (emulator required).
//!
//! Drives the full workflow: cart → initiate → provider confirmation →
//! finalize → ledger → download gate, including the replay and tampering
//! cases the flow exists to survive.

use bookos_api::config::Config;
use bookos_api::error::AppError;
use bookos_api::models::{Book, PaymentStatus, Role, UserAccount};
use bookos_api::services::checkout::{FinalState, InitiateOutcome, ReturnParams};
use bookos_api::services::CartOwner;
use bookos_api::AppState;
use std::sync::Arc;

mod common;
use common::{build_state, test_db};

fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}{}", prefix, nanos)
}

async fn emulator_state() -> Arc<AppState> {
    build_state(Config::test_default(), test_db().await)
}

async fn seed_shopper(state: &AppState, price: &str) -> (UserAccount, Book) {
    let user = UserAccount {
        id: unique_id("user"),
        email: "shopper@example.com".to_string(),
        name: Some("Shopper".to_string()),
        role: Role::User,
        credits: "10000".parse().unwrap(),
        disabled: false,
        created_at: chrono::Utc::now().to_rfc3339(),
        updated_at: None,
    };
    state.db.upsert_user(&user).await.unwrap();

    let book = Book {
        id: unique_id("book"),
        title: "The Test Book".to_string(),
        author: "Author".to_string(),
        price: price.parse().unwrap(),
        cover: None,
        description: None,
        category: None,
        storage_path: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state.db.upsert_book(&book).await.unwrap();

    let item = bookos_api::models::CartItem::from_book(&book, chrono::Utc::now().to_rfc3339());
    state
        .cart
        .add(&CartOwner::User(user.id.clone()), item)
        .await
        .unwrap();

    (user, book)
}

/// Initiate and return the created reference.
async fn initiate(state: &AppState, user: &UserAccount) -> String {
    match state.checkout.initiate(user).await.unwrap() {
        InitiateOutcome::Redirect {
            reference,
            checkout_url,
        } => {
            assert!(checkout_url.contains("/payment/simulator?reference="));
            reference
        }
        InitiateOutcome::Blocked { blocked_ids } => {
            panic!("checkout unexpectedly blocked: {:?}", blocked_ids)
        }
    }
}

/// What the signed provider callback does, distilled.
async fn confirm_payment(state: &AppState, reference: &str) {
    state.payments.mark_outcome(reference, true).await.unwrap();
}

#[tokio::test]
async fn test_full_checkout_scenario() {
    require_emulator!();

    let state = emulator_state().await;
    // Cart [12.99], tax 20% -> intent amount 15.59
    let (user, book) = seed_shopper(&state, "12.99").await;

    let reference = initiate(&state, &user).await;

    let intent = state.db.get_payment(&reference).await.unwrap().unwrap();
    assert_eq!(intent.amount, "15.59".parse().unwrap());
    assert_eq!(intent.status, PaymentStatus::Pending);
    assert_eq!(intent.items.len(), 1);
    assert_eq!(intent.items[0].book_id, book.id);
    assert_eq!(intent.items[0].price, "12.99".parse().unwrap());

    // Return navigation before the provider confirmed: no fulfillment yet
    let early = state
        .checkout
        .finalize(
            &user.id,
            &reference,
            &ReturnParams {
                status: Some("success".to_string()),
                amount: Some("15.59".to_string()),
            },
        )
        .await;
    assert_eq!(early.state, FinalState::Processing);
    assert!(!state.db.has_purchased(&user.id, &book.id).await.unwrap());

    // Provider confirms through the signed callback path
    confirm_payment(&state, &reference).await;

    let outcome = state
        .checkout
        .finalize(
            &user.id,
            &reference,
            &ReturnParams {
                status: Some("success".to_string()),
                amount: Some("15.59".to_string()),
            },
        )
        .await;
    assert_eq!(outcome.state, FinalState::Success);

    // Exactly one purchase record, cart cleared, credits decremented
    assert!(state.db.has_purchased(&user.id, &book.id).await.unwrap());
    assert_eq!(state.db.purchases_for_user(&user.id).await.unwrap().len(), 1);
    assert!(state.db.get_cart_items(&user.id).await.unwrap().is_empty());
    assert_eq!(state.cart.count(&user.id), 0);

    let account = state.db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(account.credits, "9984.41".parse().unwrap());

    println!("✓ Full checkout scenario verified: {}", reference);
}

#[tokio::test]
async fn test_finalize_replay_is_idempotent() {
    require_emulator!();

    let state = emulator_state().await;
    let (user, book) = seed_shopper(&state, "12.99").await;
    let reference = initiate(&state, &user).await;
    confirm_payment(&state, &reference).await;

    let params = ReturnParams {
        status: Some("success".to_string()),
        amount: Some("15.59".to_string()),
    };

    let first = state.checkout.finalize(&user.id, &reference, &params).await;
    let second = state.checkout.finalize(&user.id, &reference, &params).await;
    let third = state.checkout.finalize(&user.id, &reference, &params).await;

    assert_eq!(first.state, FinalState::Success);
    assert_eq!(second.state, FinalState::Success);
    assert_eq!(third.state, FinalState::Success);

    // Same record set as a single invocation, credits charged once
    assert_eq!(state.db.purchases_for_user(&user.id).await.unwrap().len(), 1);
    assert!(state.db.has_purchased(&user.id, &book.id).await.unwrap());

    let account = state.db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(account.credits, "9984.41".parse().unwrap());

    println!("✓ Finalize replay idempotent: {}", reference);
}

#[tokio::test]
async fn test_finalize_rejects_tampered_amount() {
    require_emulator!();

    let state = emulator_state().await;
    let (user, book) = seed_shopper(&state, "12.99").await;
    let reference = initiate(&state, &user).await;
    confirm_payment(&state, &reference).await;

    // Tampered amount must fail regardless of the claimed status
    let outcome = state
        .checkout
        .finalize(
            &user.id,
            &reference,
            &ReturnParams {
                status: Some("success".to_string()),
                amount: Some("0.01".to_string()),
            },
        )
        .await;

    assert_eq!(outcome.state, FinalState::Failed);
    assert!(!state.db.has_purchased(&user.id, &book.id).await.unwrap());

    println!("✓ Amount tampering rejected: {}", reference);
}

#[tokio::test]
async fn test_finalize_rejects_foreign_identity() {
    require_emulator!();

    let state = emulator_state().await;
    let (user, book) = seed_shopper(&state, "12.99").await;
    let reference = initiate(&state, &user).await;
    confirm_payment(&state, &reference).await;

    let intruder = unique_id("intruder");
    let outcome = state
        .checkout
        .finalize(
            &intruder,
            &reference,
            &ReturnParams {
                status: Some("success".to_string()),
                amount: Some("15.59".to_string()),
            },
        )
        .await;

    assert_eq!(outcome.state, FinalState::Failed);
    assert!(!state.db.has_purchased(&intruder, &book.id).await.unwrap());
    assert!(!state.db.has_purchased(&user.id, &book.id).await.unwrap());

    println!("✓ Cross-user finalize rejected: {}", reference);
}

#[tokio::test]
async fn test_finalize_unknown_reference_fails() {
    require_emulator!();

    let state = emulator_state().await;
    let (user, _) = seed_shopper(&state, "12.99").await;

    let outcome = state
        .checkout
        .finalize(&user.id, "PAY_does_not_exist", &ReturnParams::default())
        .await;

    assert_eq!(outcome.state, FinalState::Failed);

    println!("✓ Unknown reference rejected");
}

#[tokio::test]
async fn test_no_double_purchase() {
    require_emulator!();

    let state = emulator_state().await;
    let (user, book) = seed_shopper(&state, "12.99").await;
    let reference = initiate(&state, &user).await;
    confirm_payment(&state, &reference).await;

    let params = ReturnParams {
        status: Some("success".to_string()),
        amount: Some("15.59".to_string()),
    };
    let outcome = state.checkout.finalize(&user.id, &reference, &params).await;
    assert_eq!(outcome.state, FinalState::Success);

    // Put the same book back in the cart and try to buy it again
    let item = bookos_api::models::CartItem::from_book(&book, chrono::Utc::now().to_rfc3339());
    state
        .cart
        .add(&CartOwner::User(user.id.clone()), item)
        .await
        .unwrap();

    match state.checkout.initiate(&user).await.unwrap() {
        InitiateOutcome::Blocked { blocked_ids } => {
            assert_eq!(blocked_ids, vec![book.id.clone()]);
        }
        InitiateOutcome::Redirect { .. } => panic!("already-owned book must block checkout"),
    }

    assert_eq!(state.db.purchases_for_user(&user.id).await.unwrap().len(), 1);

    println!("✓ No double purchase for ({}, {})", user.id, book.id);
}

#[tokio::test]
async fn test_download_gate_follows_ledger() {
    require_emulator!();

    let state = emulator_state().await;
    let (user, book) = seed_shopper(&state, "12.99").await;

    // Not purchased yet: denied
    let denied = state.downloads.resolve_download(&user.id, &book.id).await;
    assert!(matches!(denied, Err(AppError::NotPurchased)));

    let reference = initiate(&state, &user).await;
    confirm_payment(&state, &reference).await;
    let outcome = state
        .checkout
        .finalize(
            &user.id,
            &reference,
            &ReturnParams {
                status: Some("success".to_string()),
                amount: Some("15.59".to_string()),
            },
        )
        .await;
    assert_eq!(outcome.state, FinalState::Success);

    // Purchased: the gate resolves a URL for the stored file
    let url = state
        .downloads
        .resolve_download(&user.id, &book.id)
        .await
        .unwrap();
    assert!(url.contains(&format!("books/{}.pdf", book.id)));

    // Revoke and the very next request is denied (no caching)
    state
        .db
        .delete_purchase(&bookos_api::models::purchase_key(&user.id, &book.id))
        .await
        .unwrap();
    let after = state.downloads.resolve_download(&user.id, &book.id).await;
    assert!(matches!(after, Err(AppError::NotPurchased)));

    println!("✓ Download gate follows the ledger: {}", book.id);
}

#[tokio::test]
async fn test_initiate_with_empty_cart_fails() {
    require_emulator!();

    let state = emulator_state().await;
    let user = UserAccount {
        id: unique_id("user"),
        email: "empty@example.com".to_string(),
        name: None,
        role: Role::User,
        credits: "10000".parse().unwrap(),
        disabled: false,
        created_at: chrono::Utc::now().to_rfc3339(),
        updated_at: None,
    };
    state.db.upsert_user(&user).await.unwrap();

    let result = state.checkout.initiate(&user).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    println!("✓ Empty cart cannot start a checkout");
}
