// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cart routes.
//!
//! These work with or without an identity: anonymous shoppers get an opaque
//! cart cookie backing the local tier, authenticated shoppers additionally
//! get the remote mirror. `sync` is called by the frontend when the shopper
//! logs in, folding the guest cart into the account cart.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::try_auth;
use crate::models::CartItem;
use crate::services::auth::generate_id;
use crate::services::CartOwner;
use crate::AppState;

/// Anonymous cart cookie name.
pub const CART_COOKIE: &str = "bookos_cart";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{book_id}", delete(remove_item))
        .route("/api/cart/sync", post(sync_cart))
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub book_id: String,
}

#[derive(Serialize)]
pub struct AddItemResponse {
    /// False when the book was already in the cart (no-op)
    pub added: bool,
    pub count: usize,
}

/// Local-tier key for a guest cookie token.
fn guest_key(token: &str) -> String {
    format!("guest_{}", token)
}

/// Resolve the acting cart owner, minting a guest cookie when needed.
fn resolve_owner(
    state: &AppState,
    headers: &HeaderMap,
    jar: CookieJar,
) -> Result<(CartOwner, CookieJar)> {
    if let Some(user) = try_auth(headers, &jar, &state.config.jwt_signing_key) {
        return Ok((CartOwner::User(user.user_id), jar));
    }

    if let Some(cookie) = jar.get(CART_COOKIE) {
        return Ok((CartOwner::Guest(guest_key(cookie.value())), jar));
    }

    let token = generate_id()?;
    let owner = CartOwner::Guest(guest_key(&token));
    let cookie = Cookie::build((CART_COOKIE, token))
        .path("/")
        .http_only(true)
        .build();

    Ok((owner, jar.add(cookie)))
}

/// Current cart contents.
async fn get_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CartResponse>)> {
    let (owner, jar) = resolve_owner(&state, &headers, jar)?;
    let items = state.cart.items(&owner).await?;

    Ok((
        jar,
        Json(CartResponse {
            count: items.len(),
            items,
        }),
    ))
}

/// Add a book to the cart. No-op if it is already there.
async fn add_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<AddItemRequest>,
) -> Result<(CookieJar, Json<AddItemResponse>)> {
    let (owner, jar) = resolve_owner(&state, &headers, jar)?;

    let book = state
        .db
        .get_book(&payload.book_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", payload.book_id)))?;

    let item = CartItem::from_book(&book, crate::time_utils::now_rfc3339());
    let added = state.cart.add(&owner, item).await?;

    Ok((
        jar,
        Json(AddItemResponse {
            added,
            count: state.cart.count(owner.key()),
        }),
    ))
}

/// Remove a book from the cart.
async fn remove_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(book_id): Path<String>,
) -> Result<(CookieJar, Json<CartResponse>)> {
    let (owner, jar) = resolve_owner(&state, &headers, jar)?;
    state.cart.remove(&owner, &book_id).await?;

    let items = state.cart.local_items(owner.key());
    Ok((
        jar,
        Json(CartResponse {
            count: items.len(),
            items,
        }),
    ))
}

/// Empty the cart.
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CartResponse>)> {
    let (owner, jar) = resolve_owner(&state, &headers, jar)?;
    state.cart.clear(&owner).await?;

    Ok((
        jar,
        Json(CartResponse {
            items: Vec::new(),
            count: 0,
        }),
    ))
}

/// Merge the guest cart into the account cart after login.
///
/// Idempotent: replaying the call (or racing it with adds) converges on the
/// same union.
async fn sync_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CartResponse>)> {
    let user = try_auth(&headers, &jar, &state.config.jwt_signing_key)
        .ok_or(AppError::Unauthorized)?;

    let guest = jar.get(CART_COOKIE).map(|c| guest_key(c.value()));
    let items = state.cart.sync(&user.user_id, guest.as_deref()).await?;

    // The guest tier is folded in; drop its cookie
    let mut removal = Cookie::from(CART_COOKIE);
    removal.set_path("/");
    let jar = jar.remove(removal);

    Ok((
        jar,
        Json(CartResponse {
            count: items.len(),
            items,
        }),
    ))
}
