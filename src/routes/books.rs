// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public catalogue routes.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Book;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(list_books))
        .route("/books/{book_id}", get(get_book))
}

#[derive(Deserialize)]
struct BooksQuery {
    /// Filter by category
    category: Option<String>,
    /// Pagination: page number (1-indexed)
    #[serde(default = "default_page")]
    page: u32,
    /// Pagination: items per page
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

/// List catalogue books.
async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BooksQuery>,
) -> Result<Json<Vec<Book>>> {
    if query.page == 0 {
        return Err(AppError::BadRequest(
            "Invalid 'page' parameter: must be >= 1".to_string(),
        ));
    }
    let per_page = query.per_page.min(MAX_PER_PAGE);
    let offset = (query.page - 1) * per_page;

    let books = state
        .db
        .list_books(query.category.as_deref(), per_page, offset)
        .await?;

    Ok(Json(books))
}

/// Get a single book.
async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<Book>> {
    let book = state
        .db
        .get_book(&book_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

    Ok(Json(book))
}
