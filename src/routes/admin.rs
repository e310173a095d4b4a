// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin back-office routes: books, users, payments.
//!
//! All routes here sit behind `require_auth` + `require_admin`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{Book, PaymentIntent, PaymentStatus, Role, UserAccount};
use crate::services::auth::generate_id;
use crate::AppState;

/// Admin routes (auth + admin middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/books", post(create_book))
        .route(
            "/admin/books/{book_id}",
            put(update_book).delete(delete_book),
        )
        .route("/admin/books/{book_id}/file", post(upload_book_file))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{user_id}", put(update_user))
        .route("/admin/payments", get(list_payments))
        .route(
            "/admin/purchases/{user_id}/{book_id}",
            axum::routing::delete(revoke_purchase),
        )
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    50
}

const MAX_PER_PAGE: u32 = 100;

fn page_bounds(query: &PageQuery) -> Result<(u32, u32)> {
    if query.page == 0 {
        return Err(AppError::BadRequest(
            "Invalid 'page' parameter: must be >= 1".to_string(),
        ));
    }
    let per_page = query.per_page.min(MAX_PER_PAGE);
    Ok((per_page, (query.page - 1) * per_page))
}

// ─── Books ───────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct BookPayload {
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub author: String,
    pub price: Decimal,
    pub cover: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Add a book to the catalogue.
async fn create_book(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BookPayload>,
) -> Result<Json<Book>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.price.is_sign_negative() {
        return Err(AppError::BadRequest("Price must not be negative".to_string()));
    }

    let book = Book {
        id: generate_id()?,
        title: payload.title,
        author: payload.author,
        price: payload.price,
        cover: payload.cover,
        description: payload.description,
        category: payload.category,
        storage_path: None,
        created_at: crate::time_utils::now_rfc3339(),
    };

    state.db.upsert_book(&book).await?;
    tracing::info!(book_id = %book.id, title = %book.title, "Book created");

    Ok(Json(book))
}

/// Update a catalogue book (metadata only; files go through /file).
async fn update_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
    Json(payload): Json<BookPayload>,
) -> Result<Json<Book>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let existing = state
        .db
        .get_book(&book_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

    let book = Book {
        id: existing.id,
        title: payload.title,
        author: payload.author,
        price: payload.price,
        cover: payload.cover.or(existing.cover),
        description: payload.description,
        category: payload.category,
        storage_path: existing.storage_path,
        created_at: existing.created_at,
    };

    state.db.upsert_book(&book).await?;
    Ok(Json(book))
}

/// Remove a book from the catalogue. Existing purchases keep working; the
/// download gate falls back to the purchase snapshot.
async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.db.delete_book(&book_id).await?;
    tracing::info!(book_id = %book_id, "Book deleted");
    Ok(Json(serde_json::json!({ "deleted": book_id })))
}

#[derive(Deserialize)]
struct UploadQuery {
    /// "pdf" (the book file) or "cover"
    #[serde(default = "default_kind")]
    kind: String,
}

fn default_kind() -> String {
    "pdf".to_string()
}

/// Upload a book asset to blob storage and wire it to the catalogue entry.
async fn upload_book_file(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Book>> {
    let mut book = state
        .db
        .get_book(&book_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

    if body.is_empty() {
        return Err(AppError::BadRequest("Empty file upload".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    match query.kind.as_str() {
        "pdf" => {
            let path = format!("books/{}.pdf", book_id);
            state
                .storage
                .put_file(&path, body.to_vec(), &content_type)
                .await?;
            book.storage_path = Some(path);
        }
        "cover" => {
            let path = format!("covers/{}", book_id);
            state
                .storage
                .put_file(&path, body.to_vec(), &content_type)
                .await?;
            book.cover = Some(state.storage.get_download_url(&path).await?);
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown upload kind: {}",
                other
            )));
        }
    }

    state.db.upsert_book(&book).await?;
    tracing::info!(book_id = %book_id, kind = %query.kind, "Book asset uploaded");

    Ok(Json(book))
}

// ─── Users ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct AdminUserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub credits: Decimal,
    pub disabled: bool,
    pub created_at: String,
}

impl From<UserAccount> for AdminUserResponse {
    fn from(user: UserAccount) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            credits: user.credits,
            disabled: user.disabled,
            created_at: user.created_at,
        }
    }
}

/// List user accounts.
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<AdminUserResponse>>> {
    let (per_page, offset) = page_bounds(&query)?;
    let users = state.db.list_users(per_page, offset).await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub disabled: Option<bool>,
}

/// Flip a user's role or disabled flag.
async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<AdminUserResponse>> {
    let mut user = state
        .db
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(disabled) = payload.disabled {
        user.disabled = disabled;
    }
    user.updated_at = Some(chrono::Utc::now().to_rfc3339());

    state.db.upsert_user(&user).await?;
    tracing::info!(user_id = %user.id, role = ?user.role, disabled = user.disabled, "User updated");

    Ok(Json(user.into()))
}

/// Revoke a purchase (refund). Takes effect on the next download attempt
/// since the gate never caches its decision.
async fn revoke_purchase(
    State(state): State<Arc<AppState>>,
    Path((user_id, book_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let key = crate::models::purchase_key(&user_id, &book_id);
    state.db.delete_purchase(&key).await?;
    tracing::info!(user_id = %user_id, book_id = %book_id, "Purchase revoked");
    Ok(Json(serde_json::json!({ "revoked": key })))
}

// ─── Payments ────────────────────────────────────────────────

#[derive(Deserialize)]
struct PaymentsQuery {
    /// Filter: "pending", "completed" or "failed"
    status: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

/// List payment intents, newest first.
async fn list_payments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<Vec<PaymentIntent>>> {
    let status = match query.status.as_deref() {
        None => None,
        Some("pending") => Some(PaymentStatus::Pending),
        Some("completed") => Some(PaymentStatus::Completed),
        Some("failed") => Some(PaymentStatus::Failed),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Invalid 'status' parameter: {}",
                other
            )));
        }
    };

    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (per_page, offset) = page_bounds(&page)?;

    let payments = state.db.list_payments(status, per_page, offset).await?;
    Ok(Json(payments))
}
