// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase fulfillment: the download gate and the shopper's library.

use futures_util::{stream, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::firestore::MAX_CONCURRENT_DB_OPS;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::services::ledger::PurchaseLedger;
use crate::services::storage::StorageClient;

/// A purchased book as shown in the shopper's library.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryItem {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub cover: Option<String>,
    pub price: Decimal,
    pub purchased_at: String,
}

/// Resolves download access for purchased books.
#[derive(Clone)]
pub struct DownloadService {
    db: FirestoreDb,
    ledger: PurchaseLedger,
    storage: StorageClient,
}

impl DownloadService {
    pub fn new(db: FirestoreDb, ledger: PurchaseLedger, storage: StorageClient) -> Self {
        Self {
            db,
            ledger,
            storage,
        }
    }

    /// Resolve a retrievable URL for a purchased book.
    ///
    /// Ownership is re-checked against the ledger on every request. The
    /// decision is never cached, so a revoked purchase record denies access
    /// immediately.
    pub async fn resolve_download(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<String, AppError> {
        if !self.ledger.has_purchased(user_id, book_id).await? {
            tracing::warn!(user_id, book_id, "Download denied: not purchased");
            return Err(AppError::NotPurchased);
        }

        let path = match self.db.get_book(book_id).await? {
            Some(book) => book.file_path(),
            // Purchased but delisted: the stored file keeps the legacy path
            None => format!("books/{}.pdf", book_id),
        };

        let url = self.storage.get_download_url(&path).await?;

        tracing::info!(user_id, book_id, "Download URL resolved");
        Ok(url)
    }

    /// The shopper's library: purchases joined with catalogue metadata.
    /// Falls back to the snapshot captured on the purchase record when a
    /// book has been delisted.
    pub async fn library(&self, user_id: &str) -> Result<Vec<LibraryItem>, AppError> {
        let purchases = self.ledger.purchases_for_user(user_id).await?;

        let items: Vec<LibraryItem> = stream::iter(purchases)
            .map(|purchase| async move {
                let book = self.db.get_book(&purchase.book_id).await?;
                Ok::<_, AppError>(match book {
                    Some(book) => LibraryItem {
                        book_id: purchase.book_id,
                        title: book.title,
                        author: book.author,
                        cover: book.cover,
                        price: purchase.price,
                        purchased_at: purchase.created_at,
                    },
                    None => LibraryItem {
                        book_id: purchase.book_id,
                        title: purchase.title,
                        author: String::new(),
                        cover: None,
                        price: purchase.price,
                        purchased_at: purchase.created_at,
                    },
                })
            })
            // buffered (not unordered) keeps the newest-first ledger order
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<LibraryItem, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<LibraryItem>, AppError>>()?;

        Ok(items)
    }
}
