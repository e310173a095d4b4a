// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Two-tier cart store.
//!
//! The local tier is an in-process map keyed by cart owner (guest cookie key
//! before login, user id after) and is authoritative for what the shopper
//! sees. The remote tier is the `carts` Firestore mirror, present only for
//! authenticated owners. Local mutations apply first; mirror failures are
//! surfaced to the caller but never roll the local tier back.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::CartItem;

/// Who a cart belongs to. Guests have only the local tier.
#[derive(Debug, Clone)]
pub enum CartOwner {
    /// Anonymous shopper, keyed by an opaque cookie token
    Guest(String),
    /// Authenticated shopper, keyed by user id
    User(String),
}

impl CartOwner {
    /// Key into the local tier.
    pub fn key(&self) -> &str {
        match self {
            CartOwner::Guest(key) => key,
            CartOwner::User(id) => id,
        }
    }

    /// User id when the owner is authenticated (remote mirror active).
    pub fn user_id(&self) -> Option<&str> {
        match self {
            CartOwner::Guest(_) => None,
            CartOwner::User(id) => Some(id),
        }
    }
}

/// Cart store over the local tier and the remote Firestore mirror.
#[derive(Clone)]
pub struct CartService {
    local: Arc<DashMap<String, Vec<CartItem>>>,
    db: FirestoreDb,
}

impl CartService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            db,
        }
    }

    // ─── Pure Local Queries ──────────────────────────────────────

    /// Items currently in the local tier for an owner key.
    pub fn local_items(&self, key: &str) -> Vec<CartItem> {
        self.local.get(key).map(|v| v.clone()).unwrap_or_default()
    }

    /// Whether a book is in the cart (local tier).
    pub fn is_in_cart(&self, key: &str, book_id: &str) -> bool {
        self.local
            .get(key)
            .is_some_and(|v| v.iter().any(|i| i.id == book_id))
    }

    /// Number of items in the cart (local tier).
    pub fn count(&self, key: &str) -> usize {
        self.local.get(key).map(|v| v.len()).unwrap_or(0)
    }

    // ─── Mutations ───────────────────────────────────────────────

    /// Add an item to the cart. No-op if the book is already present.
    ///
    /// The local tier is updated first; for authenticated owners the item is
    /// then mirrored remotely. A mirror failure propagates to the caller
    /// while the local insert stands.
    pub async fn add(&self, owner: &CartOwner, item: CartItem) -> Result<bool, AppError> {
        let inserted = {
            let mut entry = self.local.entry(owner.key().to_string()).or_default();
            if entry.iter().any(|i| i.id == item.id) {
                false
            } else {
                entry.push(item.clone());
                true
            }
        };

        if !inserted {
            return Ok(false);
        }

        if let Some(user_id) = owner.user_id() {
            self.db.set_cart_item(user_id, &item).await?;
        }

        Ok(true)
    }

    /// Remove an item from the cart.
    pub async fn remove(&self, owner: &CartOwner, book_id: &str) -> Result<(), AppError> {
        {
            if let Some(mut entry) = self.local.get_mut(owner.key()) {
                entry.retain(|i| i.id != book_id);
            }
        }

        if let Some(user_id) = owner.user_id() {
            self.db.delete_cart_item(user_id, book_id).await?;
        }

        Ok(())
    }

    /// Empty the cart; deletes the whole remote mirror in one atomic batch.
    pub async fn clear(&self, owner: &CartOwner) -> Result<(), AppError> {
        self.local.remove(owner.key());

        if let Some(user_id) = owner.user_id() {
            self.db.clear_cart(user_id).await?;
        }

        Ok(())
    }

    /// Remove just-purchased items from both tiers.
    pub async fn clear_purchased(
        &self,
        user_id: &str,
        book_ids: &[String],
    ) -> Result<(), AppError> {
        {
            if let Some(mut entry) = self.local.get_mut(user_id) {
                entry.retain(|i| !book_ids.contains(&i.id));
            }
        }

        self.db.delete_cart_items(user_id, book_ids).await
    }

    // ─── Sync ────────────────────────────────────────────────────

    /// Merge the local tier with the remote mirror when an identity becomes
    /// available, folding in the pre-login guest tier first.
    ///
    /// The merge is union-wins and the write-back is one atomic batch, so
    /// repeated invocation (page reloads, races with concurrent adds) is
    /// safe: re-merging an already-merged cart is a fixed point.
    pub async fn sync(
        &self,
        user_id: &str,
        guest_key: Option<&str>,
    ) -> Result<Vec<CartItem>, AppError> {
        {
            if let Some(guest_key) = guest_key {
                if let Some((_, guest_items)) = self.local.remove(guest_key) {
                    let mut entry = self.local.entry(user_id.to_string()).or_default();
                    for item in guest_items {
                        if !entry.iter().any(|i| i.id == item.id) {
                            entry.push(item);
                        }
                    }
                }
            }
        }

        let local_items = self.local_items(user_id);
        let remote_items = self.db.get_cart_items(user_id).await?;

        let (merged, stale_ids) = merge_union(&local_items, &remote_items);
        self.db.write_cart_batch(user_id, &merged, &stale_ids).await?;

        self.local.insert(user_id.to_string(), merged.clone());

        tracing::debug!(
            user_id,
            local = local_items.len(),
            remote = remote_items.len(),
            merged = merged.len(),
            "Cart synced"
        );
        Ok(merged)
    }

    /// Items for an owner, reading through to the remote mirror when the
    /// local tier has no entry (fresh process, authenticated shopper).
    pub async fn items(&self, owner: &CartOwner) -> Result<Vec<CartItem>, AppError> {
        if let Some(items) = self.local.get(owner.key()).map(|v| v.clone()) {
            return Ok(items);
        }

        match owner.user_id() {
            Some(user_id) => {
                let items = self.db.get_cart_items(user_id).await?;
                self.local.insert(user_id.to_string(), items.clone());
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Union-wins merge of the two cart tiers.
///
/// Any item present in either tier survives; the local copy wins when both
/// tiers carry the same book id. The second element is the set of remote ids
/// absent from the merged set; under union-wins this is always empty, and
/// deletions only ever happen through explicit removal.
pub fn merge_union(
    local: &[CartItem],
    remote: &[CartItem],
) -> (Vec<CartItem>, Vec<String>) {
    let mut merged: Vec<CartItem> = local.to_vec();
    let mut seen: HashSet<String> = local.iter().map(|i| i.id.clone()).collect();

    for item in remote {
        if seen.insert(item.id.clone()) {
            merged.push(item.clone());
        }
    }

    let stale: Vec<String> = remote
        .iter()
        .filter(|i| !merged.iter().any(|m| m.id == i.id))
        .map(|i| i.id.clone())
        .collect();

    (merged, stale)
}
