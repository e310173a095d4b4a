// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, credit ledger)
//! - Credentials (password hashes, keyed by email)
//! - Books (catalogue)
//! - Carts (remote mirror of the shopper's cart)
//! - Payments (provider-facing intents, keyed by reference)
//! - Purchases (one record per (user, book), the download-access ledger)

use crate::db::collections;
use crate::error::AppError;
use crate::models::user::Credential;
use crate::models::{
    purchase_key, Book, CartEntry, CartItem, PaymentIntent, PaymentItem, PaymentStatus,
    PurchaseRecord, UserAccount,
};
use futures_util::{stream, StreamExt};
use rust_decimal::Decimal;

pub const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user account by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user account.
    pub async fn upsert_user(&self, user: &UserAccount) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List user accounts for the back-office, newest first.
    pub async fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<UserAccount>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply a delta to a user's credit ledger (fetch-modify-write).
    ///
    /// Best-effort bookkeeping; callers must not treat credits as an
    /// authorization gate.
    pub async fn adjust_credits(&self, user_id: &str, delta: Decimal) -> Result<(), AppError> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        user.credits += delta;
        user.updated_at = Some(chrono::Utc::now().to_rfc3339());
        self.upsert_user(&user).await?;

        tracing::debug!(user_id, delta = %delta, credits = %user.credits, "Credits adjusted");
        Ok(())
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get the login credential for a normalized email.
    pub async fn get_credential(&self, email: &str) -> Result<Option<Credential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store the credential for a new account.
    ///
    /// Uses a create (not an upsert) so a racing duplicate registration
    /// fails loudly instead of silently overwriting a hash.
    pub async fn create_credential(
        &self,
        email: &str,
        credential: &Credential,
    ) -> Result<(), AppError> {
        let _: Credential = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::CREDENTIALS)
            .document_id(email)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Book Operations ─────────────────────────────────────────

    /// Get a book by catalogue ID.
    pub async fn get_book(&self, book_id: &str) -> Result<Option<Book>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::BOOKS)
            .obj()
            .one(book_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List catalogue books with pagination and an optional category filter.
    pub async fn list_books(
        &self,
        category: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Book>, AppError> {
        let query = self.get_client()?.fluent().select().from(collections::BOOKS);

        let query = if let Some(category) = category {
            let category = category.to_string();
            query.filter(move |q| q.for_all([q.field("category").eq(category.clone())]))
        } else {
            query
        };

        query
            .order_by([("title", firestore::FirestoreQueryDirection::Ascending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a catalogue book.
    pub async fn upsert_book(&self, book: &Book) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BOOKS)
            .document_id(&book.id)
            .object(book)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a catalogue book.
    pub async fn delete_book(&self, book_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::BOOKS)
            .document_id(book_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Cart Mirror Operations ──────────────────────────────────

    /// Read the remote cart mirror for a user.
    pub async fn get_cart_items(&self, user_id: &str) -> Result<Vec<CartItem>, AppError> {
        let uid = user_id.to_string();
        let entries: Vec<CartEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CARTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(uid.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(entries.into_iter().map(|e| e.item).collect())
    }

    /// Mirror a single cart item for a user (upsert).
    pub async fn set_cart_item(&self, user_id: &str, item: &CartItem) -> Result<(), AppError> {
        let entry = CartEntry {
            user_id: user_id.to_string(),
            item: item.clone(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CARTS)
            .document_id(purchase_key(user_id, &item.id))
            .object(&entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove a single cart item from the remote mirror.
    pub async fn delete_cart_item(&self, user_id: &str, book_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::CARTS)
            .document_id(purchase_key(user_id, book_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write a merged cart back in one atomic batch: upserts for the merged
    /// set plus deletes for stale remote ids (empty under union-wins merge,
    /// computed anyway so explicit removals stay the only deletion path).
    pub async fn write_cart_batch(
        &self,
        user_id: &str,
        items: &[CartItem],
        stale_ids: &[String],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for item in items {
            let entry = CartEntry {
                user_id: user_id.to_string(),
                item: item.clone(),
                updated_at: now.clone(),
            };

            client
                .fluent()
                .update()
                .in_col(collections::CARTS)
                .document_id(purchase_key(user_id, &item.id))
                .object(&entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add cart upsert to transaction: {}", e))
                })?;
        }

        for book_id in stale_ids {
            client
                .fluent()
                .delete()
                .from(collections::CARTS)
                .document_id(purchase_key(user_id, book_id))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add cart delete to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Cart batch commit failed: {}", e)))?;

        tracing::debug!(
            user_id,
            upserts = items.len(),
            deletes = stale_ids.len(),
            "Cart mirror batch written"
        );
        Ok(())
    }

    /// Delete specific cart items in one atomic batch (post-purchase clear).
    pub async fn delete_cart_items(
        &self,
        user_id: &str,
        book_ids: &[String],
    ) -> Result<(), AppError> {
        self.batch_delete(book_ids, collections::CARTS, |book_id: &String| {
            purchase_key(user_id, book_id)
        })
        .await
    }

    /// Delete the whole remote mirror for a user in one atomic batch.
    pub async fn clear_cart(&self, user_id: &str) -> Result<(), AppError> {
        let items = self.get_cart_items(user_id).await?;
        let ids: Vec<String> = items.into_iter().map(|i| i.id).collect();
        self.delete_cart_items(user_id, &ids).await
    }

    // ─── Payment Operations ──────────────────────────────────────

    /// Persist a new payment intent, keyed by its reference.
    ///
    /// Uses a create (not an upsert) so a duplicate reference fails loudly.
    /// Callers must never hand out a redirect URL unless this succeeded.
    pub async fn create_payment(&self, intent: &PaymentIntent) -> Result<(), AppError> {
        let _: PaymentIntent = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PAYMENTS)
            .document_id(&intent.reference)
            .object(intent)
            .execute()
            .await
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to persist payment intent {}: {}",
                    intent.reference, e
                ))
            })?;
        Ok(())
    }

    /// Get a payment intent by reference.
    pub async fn get_payment(&self, reference: &str) -> Result<Option<PaymentIntent>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(reference)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List payment intents for the back-office, newest first.
    pub async fn list_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PaymentIntent>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PAYMENTS);

        let query = if let Some(status) = status {
            let status = match status {
                PaymentStatus::Pending => "pending".to_string(),
                PaymentStatus::Completed => "completed".to_string(),
                PaymentStatus::Failed => "failed".to_string(),
            };
            query.filter(move |q| q.for_all([q.field("status").eq(status.clone())]))
        } else {
            query
        };

        query
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Transition a payment intent out of `Pending`.
    ///
    /// Terminal states absorb further transitions: re-delivered confirmations
    /// are an idempotent no-op that returns the stored intent unchanged.
    pub async fn update_payment_status(
        &self,
        reference: &str,
        status: PaymentStatus,
        verified: bool,
    ) -> Result<PaymentIntent, AppError> {
        let mut intent = self
            .get_payment(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", reference)))?;

        if intent.status.is_terminal() {
            tracing::debug!(
                reference,
                status = ?intent.status,
                "Payment already terminal (idempotent skip)"
            );
            return Ok(intent);
        }

        intent.status = status;
        intent.verified = verified;
        intent.updated_at = Some(chrono::Utc::now().to_rfc3339());

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(reference)
            .object(&intent)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(reference, status = ?status, verified, "Payment status updated");
        Ok(intent)
    }

    // ─── Purchase Ledger Operations ──────────────────────────────

    /// Get a purchase record by its composite key.
    pub async fn get_purchase(
        &self,
        purchase_id: &str,
    ) -> Result<Option<PurchaseRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PURCHASES)
            .obj()
            .one(purchase_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Existence check on the deterministic composite key.
    pub async fn has_purchased(&self, user_id: &str, book_id: &str) -> Result<bool, AppError> {
        Ok(self
            .get_purchase(&purchase_key(user_id, book_id))
            .await?
            .is_some())
    }

    /// All purchase records for a user, newest first.
    pub async fn purchases_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PurchaseRecord>, AppError> {
        let uid = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PURCHASES)
            .filter(move |q| q.for_all([q.field("user_id").eq(uid.clone())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically upsert one purchase record per item.
    ///
    /// Writes are upserts keyed by `purchase_key`, so re-invocation with the
    /// same items is safe.
    pub async fn record_purchases(
        &self,
        user_id: &str,
        items: &[PaymentItem],
        payment_ref: &str,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for item in items {
            let record = PurchaseRecord {
                user_id: user_id.to_string(),
                book_id: item.book_id.clone(),
                title: item.title.clone(),
                price: item.price,
                payment_ref: payment_ref.to_string(),
                created_at: now.clone(),
            };

            client
                .fluent()
                .update()
                .in_col(collections::PURCHASES)
                .document_id(purchase_key(user_id, &item.book_id))
                .object(&record)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add purchase to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Purchase batch commit failed: {}", e)))?;

        tracing::info!(user_id, payment_ref, count = items.len(), "Purchases recorded");
        Ok(())
    }

    /// Atomically fulfill a confirmed payment: upsert the purchase records
    /// and stamp `fulfilled_at` on the intent in one transaction.
    ///
    /// Returns `true` if this invocation performed the fulfillment, `false`
    /// if the intent was already fulfilled (idempotent replay). Only the
    /// `true` case may trigger one-shot side effects (credit decrement).
    pub async fn fulfill_payment_atomic(&self, reference: &str) -> Result<bool, AppError> {
        let client = self.get_client()?;

        // Fresh read; finalize may be replayed from a stale return link.
        let intent = self
            .get_payment(reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", reference)))?;

        if intent.fulfilled_at.is_some() {
            tracing::debug!(reference, "Payment already fulfilled (idempotent skip)");
            return Ok(false);
        }

        if !intent.is_confirmed() {
            return Err(AppError::BadRequest(format!(
                "Payment {} is not confirmed",
                reference
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for item in &intent.items {
            let record = PurchaseRecord {
                user_id: intent.user_id.clone(),
                book_id: item.book_id.clone(),
                title: item.title.clone(),
                price: item.price,
                payment_ref: reference.to_string(),
                created_at: now.clone(),
            };

            client
                .fluent()
                .update()
                .in_col(collections::PURCHASES)
                .document_id(purchase_key(&intent.user_id, &item.book_id))
                .object(&record)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add purchase to transaction: {}", e))
                })?;
        }

        let mut stamped = intent.clone();
        stamped.fulfilled_at = Some(now.clone());
        stamped.updated_at = Some(now);

        client
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(reference)
            .object(&stamped)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add fulfillment stamp to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Fulfillment commit failed: {}", e)))?;

        tracing::info!(
            reference,
            user_id = %intent.user_id,
            books = intent.items.len(),
            "Payment fulfilled atomically"
        );
        Ok(true)
    }

    /// Revoke a purchase record (back-office refund path). The download
    /// gate re-checks the ledger per request, so revocation takes effect
    /// immediately.
    pub async fn delete_purchase(&self, purchase_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::PURCHASES)
            .document_id(purchase_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Run purchase existence checks for many books concurrently.
    ///
    /// Concurrency is capped to avoid overloading Firestore.
    pub async fn purchased_subset(
        &self,
        user_id: &str,
        book_ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        let checks: Vec<(String, bool)> = stream::iter(book_ids.to_vec())
            .map(|book_id| async move {
                let owned = self.has_purchased(user_id, &book_id).await?;
                Ok::<_, AppError>((book_id, owned))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(String, bool), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<(String, bool)>, AppError>>()?;

        Ok(checks
            .into_iter()
            .filter(|(_, owned)| *owned)
            .map(|(id, _)| id)
            .collect())
    }
}
