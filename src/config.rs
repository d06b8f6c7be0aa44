use std::env;
use std::time::Duration;

use crate::storage::{MAX_IMAGE_BYTES, RetryPolicy};

pub const DEFAULT_BODY_LIMIT_BYTES: usize = 32 * 1024 * 1024;

// Oversized images must reach the form reader to get an `image` field error.
pub const MIN_BODY_LIMIT_BYTES: usize = MAX_IMAGE_BYTES + 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub storage: StorageConfig,
    pub revalidate_webhook_url: Option<String>,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_url: String,
    pub api_key: Option<String>,
    pub folder: String,
    pub retry: RetryPolicy,
}

/// Only the database URL; enough for the migrate and seed binaries.
pub fn database_url() -> anyhow::Result<String> {
    Ok(env::var("DATABASE_URL")?)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = database_url()?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(24);
        let body_limit_bytes = env::var("BODY_LIMIT_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_BODY_LIMIT_BYTES)
            .max(MIN_BODY_LIMIT_BYTES);

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            session_ttl_hours,
            storage: StorageConfig::from_env()?,
            revalidate_webhook_url: env::var("REVALIDATE_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            body_limit_bytes,
        })
    }
}

impl StorageConfig {
    fn from_env() -> anyhow::Result<Self> {
        let upload_url = env::var("STORAGE_UPLOAD_URL")?;
        let api_key = env::var("STORAGE_API_KEY").ok().filter(|v| !v.is_empty());
        let folder = env::var("STORAGE_FOLDER").unwrap_or_else(|_| "product_images".to_string());

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = env::var("UPLOAD_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
        {
            retry.max_attempts = attempts;
        }
        if let Some(ms) = env::var("UPLOAD_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            retry.base_delay = Duration::from_millis(ms);
        }

        Ok(Self {
            upload_url,
            api_key,
            folder,
            retry,
        })
    }
}
