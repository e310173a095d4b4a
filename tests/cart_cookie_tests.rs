// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guest cart cookie tests (offline).
//!
//! Anonymous shoppers get an opaque cart cookie backing the local tier;
//! no database access is involved until an identity appears.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;
use common::create_test_app;

#[tokio::test]
async fn test_guest_cart_mints_cookie() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/cart")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .expect("guest cart cookie should be set");
    assert!(set_cookie.starts_with("bookos_cart="));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_guest_cart_reuses_existing_cookie() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/cart")
                .header(header::COOKIE, "bookos_cart=existing_token_abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // No replacement cookie when one is already presented
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_guest_cart_starts_empty() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/cart")
                .header(header::COOKIE, "bookos_cart=existing_token_abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(parsed["count"], 0);
    assert_eq!(parsed["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_cart_sync_requires_identity() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cart/sync")
                .header(header::COOKIE, "bookos_cart=existing_token_abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
