// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication service.
//!
//! Passwords are hashed with Argon2id and stored in the `credentials`
//! collection, keyed by normalized email, separate from user profiles.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use ring::rand::{SecureRandom, SystemRandom};
use rust_decimal::Decimal;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::user::Credential;
use crate::models::{Role, UserAccount};

/// Starter balance granted to every new account.
const STARTER_CREDITS: i64 = 10_000;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration, login and account bootstrap.
#[derive(Clone)]
pub struct AuthService {
    db: FirestoreDb,
}

impl AuthService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Register a new account and return its profile.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<UserAccount, AppError> {
        let email = normalize_email(email);
        validate_password(password)?;

        if self.db.get_credential(&email).await?.is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let user = UserAccount {
            id: generate_id()?,
            email: email.clone(),
            name,
            role: Role::User,
            credits: Decimal::from(STARTER_CREDITS),
            disabled: false,
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: None,
        };

        self.db.upsert_user(&user).await?;
        // Insert (not upsert): the loud uniqueness backstop if two
        // registrations race past the read above
        self.db
            .create_credential(
                &email,
                &Credential {
                    user_id: user.id.clone(),
                    password_hash,
                },
            )
            .await?;

        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Verify credentials and return the account profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserAccount, AppError> {
        let email = normalize_email(email);

        let credential = self
            .db
            .get_credential(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        verify_password(password, &credential.password_hash)?;

        let user = match self.db.get_user(&credential.user_id).await? {
            Some(user) => user,
            None => {
                // Credential without a profile: first-auth bootstrap, same
                // fallback the store applies on first sign-in
                let user = UserAccount {
                    id: credential.user_id.clone(),
                    email: email.clone(),
                    name: None,
                    role: Role::User,
                    credits: Decimal::from(STARTER_CREDITS),
                    disabled: false,
                    created_at: chrono::Utc::now().to_rfc3339(),
                    updated_at: None,
                };
                self.db.upsert_user(&user).await?;
                tracing::info!(user_id = %user.id, "Profile bootstrapped on login");
                user
            }
        };

        if user.disabled {
            tracing::warn!(user_id = %user.id, "Login rejected: account disabled");
            return Err(AppError::Unauthorized);
        }

        tracing::info!(user_id = %user.id, "Login successful");
        Ok(user)
    }
}

/// Normalize an email for use as a credential key.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Unauthorized)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized)
}

/// Generate an opaque identifier (128 random bits, hex-encoded).
pub fn generate_id() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG unavailable")))?;
    Ok(hex::encode(bytes))
}
