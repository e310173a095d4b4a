//! User account models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account role. Admins get the back-office routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Opaque account ID (also used as document ID)
    pub id: String,
    pub email: String,
    /// Display name (may be empty if not provided at registration)
    pub name: Option<String>,
    pub role: Role,
    /// Best-effort spending ledger, decremented as payments complete.
    /// Bookkeeping only; never an authorization gate.
    pub credits: Decimal,
    /// Disabled accounts cannot log in
    pub disabled: bool,
    /// When the account was created (ISO 8601)
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Login credential, stored in `credentials` keyed by normalized email.
/// Kept in its own collection so profile reads never carry the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    /// Argon2id PHC string
    pub password_hash: String,
}
