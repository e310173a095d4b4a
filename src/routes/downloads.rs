// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Library and download routes for purchased books.

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::fulfillment::LibraryItem;
use crate::AppState;

/// Protected routes (auth middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/library", get(get_library))
        .route("/api/library/{book_id}/download", get(resolve_download))
}

#[derive(Serialize)]
pub struct LibraryResponse {
    pub items: Vec<LibraryItem>,
}

/// The shopper's purchased books.
async fn get_library(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<LibraryResponse>> {
    let items = state.downloads.library(&user.user_id).await?;
    Ok(Json(LibraryResponse { items }))
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub url: String,
}

/// Resolve a time-bounded download URL for a purchased book.
/// Ownership is re-checked on every call.
async fn resolve_download(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(book_id): Path<String>,
) -> Result<Json<DownloadResponse>> {
    let url = state
        .downloads
        .resolve_download(&user.user_id, &book_id)
        .await?;

    Ok(Json(DownloadResponse { url }))
}
