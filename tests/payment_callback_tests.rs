// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider callback endpoint tests (offline).
//!
//! The callback is the authoritative confirmation path, so its signature
//! gate must hold regardless of database availability.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tower::ServiceExt;

mod common;
use common::create_test_app;

type HmacSha256 = Hmac<Sha256>;

/// Sign a payload the way the provider does.
fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn callback_request(body: &'static [u8], signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/payments/callback")
        .header("content-type", "application/json");

    if let Some(signature) = signature {
        builder = builder.header("x-maishapay-signature", signature);
    }

    builder.body(Body::from(body)).unwrap()
}

const VALID_BODY: &[u8] = br#"{"reference":"PAY_1_user","status":"completed","amount":15.59}"#;

#[tokio::test]
async fn test_callback_without_signature_rejected() {
    let (app, _) = create_test_app();

    let response = app.oneshot(callback_request(VALID_BODY, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_with_bad_signature_rejected() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(callback_request(
            VALID_BODY,
            Some(sign("wrong_secret", VALID_BODY)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_signature_covers_payload() {
    let (app, _) = create_test_app();

    // Signature of a different payload must not authorize this one
    let other: &[u8] = br#"{"reference":"PAY_1_user","status":"failed"}"#;

    let response = app
        .oneshot(callback_request(
            VALID_BODY,
            Some(sign("test_secret_key", other)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_callback_with_unparseable_body_is_acknowledged() {
    let (app, _) = create_test_app();

    // Valid signature but garbage JSON: acknowledged with 200 so the
    // provider does not retry forever
    let body: &'static [u8] = b"not json at all";

    let response = app
        .oneshot(callback_request(body, Some(sign("test_secret_key", body))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_callback_with_valid_signature_reaches_store() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(callback_request(
            VALID_BODY,
            Some(sign("test_secret_key", VALID_BODY)),
        ))
        .await
        .unwrap();

    // Signature accepted; the offline mock database then fails the intent
    // lookup. Anything but 403 proves the gate passed.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
