//! Application configuration loaded from environment variables.
//!
//! Secrets (JWT signing key, MaishaPay keys) are read once at startup and
//! cached in memory; in production they are injected as environment
//! variables by the deployment platform's secret bindings.

use std::env;

use rust_decimal::Decimal;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL (CORS origin, payment return/cancel pages)
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Firebase Storage bucket holding covers and book files
    pub storage_bucket: String,
    /// Server port
    pub port: u16,
    /// ISO 4217 currency code for the whole store
    pub currency: String,
    /// Tax rate applied to the cart subtotal (e.g. 0.20)
    pub tax_rate: Decimal,
    /// Hours after which a Pending payment intent is considered expired
    pub pending_intent_ttl_hours: i64,
    /// MaishaPay API base URL
    pub maishapay_base_url: String,
    /// When set, checkout redirects to the frontend payment simulator
    /// instead of calling the MaishaPay API (development mode)
    pub maishapay_simulate: bool,

    // --- Secrets ---
    /// MaishaPay API key (sent as bearer token)
    pub maishapay_api_key: String,
    /// MaishaPay secret key (callback signature verification)
    pub maishapay_secret_key: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            // Non-sensitive config from env
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            storage_bucket: env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| "local-dev.appspot.com".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            currency: env::var("STORE_CURRENCY").unwrap_or_else(|_| "EUR".to_string()),
            tax_rate: env::var("TAX_RATE")
                .unwrap_or_else(|_| "0.20".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("TAX_RATE"))?,
            pending_intent_ttl_hours: env::var("PENDING_INTENT_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("PENDING_INTENT_TTL_HOURS"))?,
            maishapay_base_url: env::var("MAISHAPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.maishapay.online".to_string()),
            maishapay_simulate: env::var("MAISHAPAY_SIMULATE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            // Secrets - injected as env vars by secret bindings in prod
            maishapay_api_key: env::var("MAISHAPAY_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("MAISHAPAY_API_KEY"))?,
            maishapay_secret_key: env::var("MAISHAPAY_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("MAISHAPAY_SECRET_KEY"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            storage_bucket: "test-project.appspot.com".to_string(),
            port: 8080,
            currency: "EUR".to_string(),
            tax_rate: "0.20".parse().expect("static tax rate"),
            pending_intent_ttl_hours: 24,
            maishapay_base_url: "https://api.maishapay.online".to_string(),
            maishapay_simulate: true,
            maishapay_api_key: "test_api_key".to_string(),
            maishapay_secret_key: "test_secret_key".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
