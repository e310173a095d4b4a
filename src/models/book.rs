//! Catalogue book model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A book in the catalogue, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Catalogue ID (also used as document ID)
    pub id: String,
    pub title: String,
    pub author: String,
    /// Unit price in the store currency
    pub price: Decimal,
    /// Cover image URL
    pub cover: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Blob-storage path of the book file; `books/{id}.pdf` when unset
    pub storage_path: Option<String>,
    /// When the book was added (ISO 8601)
    pub created_at: String,
}

impl Book {
    /// Blob-storage path for the book file, with the legacy default.
    pub fn file_path(&self) -> String {
        self.storage_path
            .clone()
            .unwrap_or_else(|| format!("books/{}.pdf", self.id))
    }
}
