// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Storage client for book files and cover images.
//!
//! Talks to the Storage REST surface: uploads go to the media endpoint,
//! download URLs are built from the object's download token.

use serde::Deserialize;

use crate::error::AppError;

const STORAGE_API_BASE: &str = "https://firebasestorage.googleapis.com/v0/b";

/// Blob storage client.
#[derive(Clone)]
pub struct StorageClient {
    /// None in offline mode (tests)
    http: Option<reqwest::Client>,
    bucket: String,
}

/// Object metadata returned by the Storage API.
#[derive(Deserialize)]
struct ObjectMetadata {
    #[serde(rename = "downloadTokens")]
    download_tokens: Option<String>,
}

impl StorageClient {
    pub fn new(bucket: &str) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            bucket: bucket.to_string(),
        }
    }

    /// Create a mock storage client for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock(bucket: &str) -> Self {
        Self {
            http: None,
            bucket: bucket.to_string(),
        }
    }

    /// URL of the object endpoint for a storage path.
    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}/o/{}",
            STORAGE_API_BASE,
            self.bucket,
            urlencoding::encode(path)
        )
    }

    /// Store a file at a path (create or replace).
    pub async fn put_file(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        // Mock mode (Debug builds only)
        #[cfg(debug_assertions)]
        {
            if self.http.is_none() {
                tracing::debug!(path, size = bytes.len(), "put_file (mock)");
                return Ok(());
            }
        }

        let client = self
            .http
            .as_ref()
            .ok_or_else(|| AppError::Storage("Storage client not connected".to_string()))?;

        let url = format!(
            "{}/{}/o?uploadType=media&name={}",
            STORAGE_API_BASE,
            self.bucket,
            urlencoding::encode(path)
        );

        let response = client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage(format!(
                "Upload failed: HTTP {}: {}",
                status, body
            )));
        }

        tracing::info!(path, "File stored");
        Ok(())
    }

    /// Resolve a retrievable (tokened) URL for a stored file.
    pub async fn get_download_url(&self, path: &str) -> Result<String, AppError> {
        // Mock mode (Debug builds only)
        #[cfg(debug_assertions)]
        {
            if self.http.is_none() {
                return Ok(format!("https://storage.mock/{}/{}", self.bucket, path));
            }
        }

        let client = self
            .http
            .as_ref()
            .ok_or_else(|| AppError::Storage("Storage client not connected".to_string()))?;

        let object_url = self.object_url(path);

        let response = client
            .get(&object_url)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(AppError::NotFound(format!("File {} not found", path)));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Storage(format!(
                "Metadata fetch failed: HTTP {}",
                status
            )));
        }

        let metadata: ObjectMetadata = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Metadata parse error: {}", e)))?;

        // Objects can carry several comma-separated tokens; any one works
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Storage(format!("File {} has no download token", path)))?
            .to_string();

        Ok(format!("{}?alt=media&token={}", object_url, token))
    }
}
