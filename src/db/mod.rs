//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Password hashes, keyed by normalized email (kept out of `users`)
    pub const CREDENTIALS: &str = "credentials";
    pub const BOOKS: &str = "books";
    /// Remote cart mirror, keyed by `{user_id}_{book_id}`
    pub const CARTS: &str = "carts";
    /// Payment intents, keyed by provider reference
    pub const PAYMENTS: &str = "payments";
    /// Purchase ledger, keyed by `{user_id}_{book_id}`
    pub const PURCHASES: &str = "purchases";
}
