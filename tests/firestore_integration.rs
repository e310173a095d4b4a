// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set). The emulator provides a clean state for
//! each test run.

use bookos_api::models::{
    purchase_key, Book, PaymentIntent, PaymentItem, PaymentStatus, Role, UserAccount,
};

mod common;
use common::test_db;

/// Generate a unique id for test isolation.
fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}{}", prefix, nanos)
}

fn test_account(user_id: &str) -> UserAccount {
    UserAccount {
        id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        name: Some("Test".to_string()),
        role: Role::User,
        credits: "10000".parse().unwrap(),
        disabled: false,
        created_at: "2026-01-15T10:00:00Z".to_string(),
        updated_at: None,
    }
}

fn test_book(book_id: &str, price: &str) -> Book {
    Book {
        id: book_id.to_string(),
        title: format!("Book {}", book_id),
        author: "Author".to_string(),
        price: price.parse().unwrap(),
        cover: None,
        description: None,
        category: Some("fiction".to_string()),
        storage_path: None,
        created_at: "2026-01-15T10:00:00Z".to_string(),
    }
}

fn test_intent(reference: &str, user_id: &str, book_id: &str, amount: &str) -> PaymentIntent {
    PaymentIntent {
        reference: reference.to_string(),
        user_id: user_id.to_string(),
        user_email: format!("{}@example.com", user_id),
        amount: amount.parse().unwrap(),
        currency: "EUR".to_string(),
        status: PaymentStatus::Pending,
        verified: false,
        items: vec![PaymentItem {
            book_id: book_id.to_string(),
            title: format!("Book {}", book_id),
            price: "12.99".parse().unwrap(),
        }],
        created_at: chrono::Utc::now().to_rfc3339(),
        updated_at: None,
        fulfilled_at: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_roundtrip_and_credits() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    assert!(db.get_user(&user_id).await.unwrap().is_none());

    db.upsert_user(&test_account(&user_id)).await.unwrap();

    let fetched = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.email, format!("{}@example.com", user_id));
    assert_eq!(fetched.credits, "10000".parse().unwrap());

    // Credits are a running ledger; deltas accumulate
    db.adjust_credits(&user_id, "-15.59".parse().unwrap())
        .await
        .unwrap();
    let after = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(after.credits, "9984.41".parse().unwrap());
    assert!(after.updated_at.is_some());

    println!("✓ User roundtrip and credit ledger verified: {}", user_id);
}

// ═══════════════════════════════════════════════════════════════════════════
// PAYMENT INTENT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_payment_create_is_not_an_upsert() {
    require_emulator!();

    let db = test_db().await;
    let reference = unique_id("PAY_");
    let user_id = unique_id("user");

    let intent = test_intent(&reference, &user_id, "b1", "15.59");
    db.create_payment(&intent).await.unwrap();

    // A second create with the same reference must fail loudly
    let duplicate = db.create_payment(&intent).await;
    assert!(duplicate.is_err(), "duplicate reference should be rejected");

    println!("✓ Duplicate payment reference rejected: {}", reference);
}

#[tokio::test]
async fn test_payment_terminal_states_absorb_transitions() {
    require_emulator!();

    let db = test_db().await;
    let reference = unique_id("PAY_");
    let user_id = unique_id("user");

    db.create_payment(&test_intent(&reference, &user_id, "b1", "15.59"))
        .await
        .unwrap();

    let completed = db
        .update_payment_status(&reference, PaymentStatus::Completed, true)
        .await
        .unwrap();
    assert_eq!(completed.status, PaymentStatus::Completed);
    assert!(completed.verified);

    // A late "failed" signal must not un-complete the payment
    let after = db
        .update_payment_status(&reference, PaymentStatus::Failed, false)
        .await
        .unwrap();
    assert_eq!(after.status, PaymentStatus::Completed);
    assert!(after.verified);

    println!("✓ Terminal state absorbed late transition: {}", reference);
}

// ═══════════════════════════════════════════════════════════════════════════
// PURCHASE LEDGER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_record_purchases_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let book_id = unique_id("book");

    let items = vec![PaymentItem {
        book_id: book_id.clone(),
        title: "Book".to_string(),
        price: "12.99".parse().unwrap(),
    }];

    assert!(!db.has_purchased(&user_id, &book_id).await.unwrap());

    db.record_purchases(&user_id, &items, "PAY_ref_1")
        .await
        .unwrap();
    db.record_purchases(&user_id, &items, "PAY_ref_1")
        .await
        .unwrap();

    assert!(db.has_purchased(&user_id, &book_id).await.unwrap());
    let purchases = db.purchases_for_user(&user_id).await.unwrap();
    assert_eq!(purchases.len(), 1, "upserts must not duplicate the record");
    assert_eq!(purchases[0].payment_ref, "PAY_ref_1");

    println!("✓ Purchase ledger idempotent for ({}, {})", user_id, book_id);
}

#[tokio::test]
async fn test_fulfill_payment_atomic_runs_once() {
    require_emulator!();

    let db = test_db().await;
    let reference = unique_id("PAY_");
    let user_id = unique_id("user");
    let book_id = unique_id("book");

    db.create_payment(&test_intent(&reference, &user_id, &book_id, "15.59"))
        .await
        .unwrap();
    db.update_payment_status(&reference, PaymentStatus::Completed, true)
        .await
        .unwrap();

    // First fulfillment performs the grant
    assert!(db.fulfill_payment_atomic(&reference).await.unwrap());
    assert!(db.has_purchased(&user_id, &book_id).await.unwrap());

    let stamped = db.get_payment(&reference).await.unwrap().unwrap();
    assert!(stamped.fulfilled_at.is_some());

    // Replay is a no-op
    assert!(!db.fulfill_payment_atomic(&reference).await.unwrap());
    assert_eq!(db.purchases_for_user(&user_id).await.unwrap().len(), 1);

    println!("✓ Atomic fulfillment ran exactly once: {}", reference);
}

#[tokio::test]
async fn test_fulfill_rejects_unconfirmed_intent() {
    require_emulator!();

    let db = test_db().await;
    let reference = unique_id("PAY_");
    let user_id = unique_id("user");

    db.create_payment(&test_intent(&reference, &user_id, "b1", "15.59"))
        .await
        .unwrap();

    // Still pending/unverified: fulfillment must refuse
    let result = db.fulfill_payment_atomic(&reference).await;
    assert!(result.is_err());
    assert!(!db.has_purchased(&user_id, "b1").await.unwrap());

    println!("✓ Unconfirmed intent not fulfillable: {}", reference);
}

#[tokio::test]
async fn test_purchase_revocation() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let book_id = unique_id("book");

    let items = vec![PaymentItem {
        book_id: book_id.clone(),
        title: "Book".to_string(),
        price: "12.99".parse().unwrap(),
    }];
    db.record_purchases(&user_id, &items, "PAY_ref").await.unwrap();
    assert!(db.has_purchased(&user_id, &book_id).await.unwrap());

    db.delete_purchase(&purchase_key(&user_id, &book_id))
        .await
        .unwrap();
    assert!(!db.has_purchased(&user_id, &book_id).await.unwrap());

    println!("✓ Revoked purchase no longer grants ownership");
}

// ═══════════════════════════════════════════════════════════════════════════
// BOOK TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_book_crud_and_listing() {
    require_emulator!();

    let db = test_db().await;
    let book_id = unique_id("book");

    db.upsert_book(&test_book(&book_id, "12.99")).await.unwrap();

    let fetched = db.get_book(&book_id).await.unwrap().unwrap();
    assert_eq!(fetched.price, "12.99".parse().unwrap());
    assert_eq!(fetched.file_path(), format!("books/{}.pdf", book_id));

    let fiction = db.list_books(Some("fiction"), 100, 0).await.unwrap();
    assert!(fiction.iter().any(|b| b.id == book_id));

    db.delete_book(&book_id).await.unwrap();
    assert!(db.get_book(&book_id).await.unwrap().is_none());

    println!("✓ Book CRUD verified: {}", book_id);
}
