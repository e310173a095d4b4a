//! Cart line-item models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Book;

/// A pending cart line item. Unique by `id` within a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Book ID
    pub id: String,
    pub title: String,
    pub author: String,
    /// Unit price captured when the item was added
    pub price: Decimal,
    pub cover: Option<String>,
    /// When the item was added (ISO 8601)
    pub added_at: String,
}

impl CartItem {
    /// Snapshot a catalogue book into a cart line item.
    pub fn from_book(book: &Book, added_at: String) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            price: book.price,
            cover: book.cover.clone(),
            added_at,
        }
    }
}

/// Remote cart mirror document, stored at `carts/{user_id}_{book_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    /// Owning user (queried on sync/clear)
    pub user_id: String,
    #[serde(flatten)]
    pub item: CartItem,
    /// Last mirror write (ISO 8601)
    pub updated_at: String,
}
