use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_IMAGE_BYTES: usize = 15 * 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "image/bmp",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    #[error("No file provided")]
    Missing,

    #[error("Invalid image type: {0}. Supported types: {types}", types = ALLOWED_IMAGE_TYPES.join(", "))]
    InvalidType(String),

    #[error("Image size ({size_mb:.2}MB) exceeds the 15MB limit")]
    TooLarge { size_mb: f64 },

    #[error("{0}")]
    Remote(String),

    #[error("Image upload failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl UploadError {
    /// Rejections raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::Missing | UploadError::InvalidType(_) | UploadError::TooLarge { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// A browser submits an empty part for an untouched file input, so a file
    /// only counts as supplied when it has content and a MIME type.
    pub fn is_supplied(&self) -> bool {
        self.size() > 0 && !self.content_type.trim().is_empty()
    }
}

pub fn validate_image(file: &ImageFile) -> Result<(), UploadError> {
    if file.size() == 0 {
        return Err(UploadError::Missing);
    }
    if !ALLOWED_IMAGE_TYPES.contains(&file.content_type.as_str()) {
        return Err(UploadError::InvalidType(file.content_type.clone()));
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Err(UploadError::TooLarge {
            size_mb: file.size() as f64 / (1024.0 * 1024.0),
        });
    }
    Ok(())
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Single upload attempt; returns the public URL of the stored object.
    async fn put_image(&self, file: &ImageFile, folder: &str) -> Result<String, UploadError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): base, 2×base, 4×base, …
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Clone)]
pub struct ImageUploader {
    store: Arc<dyn ImageStore>,
    retry: RetryPolicy,
    default_folder: String,
}

impl ImageUploader {
    pub fn new(store: Arc<dyn ImageStore>, retry: RetryPolicy, default_folder: impl Into<String>) -> Self {
        Self {
            store,
            retry,
            default_folder: default_folder.into(),
        }
    }

    pub async fn upload(&self, file: &ImageFile) -> Result<String, UploadError> {
        self.upload_to(file, &self.default_folder).await
    }

    pub async fn upload_to(&self, file: &ImageFile, folder: &str) -> Result<String, UploadError> {
        let upload_id = Uuid::new_v4();
        tracing::info!(
            %upload_id,
            file = %file.file_name,
            size = file.size(),
            content_type = %file.content_type,
            "validating image"
        );

        if let Err(err) = validate_image(file) {
            tracing::warn!(%upload_id, error = %err, "image rejected");
            return Err(err);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last = String::from("Image upload failed");
        for attempt in 1..=max_attempts {
            tracing::info!(%upload_id, attempt, backend = self.store.backend_tag(), "upload attempt");
            match self.store.put_image(file, folder).await {
                Ok(url) => {
                    tracing::info!(%upload_id, attempt, %url, "image uploaded");
                    return Ok(url);
                }
                Err(err) => {
                    tracing::warn!(%upload_id, attempt, error = %err, "upload attempt failed");
                    last = err.to_string();
                }
            }
            if attempt < max_attempts {
                let delay = self.retry.delay_after(attempt);
                tracing::info!(%upload_id, delay_ms = delay.as_millis() as u64, "retrying upload");
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(%upload_id, attempts = max_attempts, "image upload failed");
        Err(UploadError::Exhausted {
            attempts: max_attempts,
            last,
        })
    }
}

/// Object store reached over HTTP with a multipart `file` + `folder` form.
/// Accepts either `url` or `secure_url` in the JSON reply.
pub struct HttpImageStore {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StoreReply {
    #[serde(alias = "secure_url")]
    url: Option<String>,
}

impl HttpImageStore {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        }
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    fn backend_tag(&self) -> &'static str {
        "http"
    }

    async fn put_image(&self, file: &ImageFile, folder: &str) -> Result<String, UploadError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| UploadError::Remote(format!("invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("folder", folder.to_string());

        let mut req = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| UploadError::Remote(format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UploadError::Remote(format!("HTTP {status}")));
        }

        let reply: StoreReply = resp
            .json()
            .await
            .map_err(|e| UploadError::Remote(format!("Invalid response: {e}")))?;
        reply
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UploadError::Remote("Invalid response: Missing image URL".into()))
    }
}
