use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::OrmConn,
    revalidate::{LogRevalidator, Revalidator, WebhookRevalidator},
    storage::{HttpImageStore, ImageUploader},
};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub jwt_secret: String,
    pub ttl_hours: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub images: ImageUploader,
    pub revalidator: Arc<dyn Revalidator>,
    pub session: SessionSettings,
}

impl AppState {
    pub fn from_config(orm: OrmConn, config: &AppConfig) -> Self {
        let store = HttpImageStore::new(
            config.storage.upload_url.clone(),
            config.storage.api_key.clone(),
        );
        let images = ImageUploader::new(
            Arc::new(store),
            config.storage.retry.clone(),
            config.storage.folder.clone(),
        );
        let revalidator: Arc<dyn Revalidator> = match &config.revalidate_webhook_url {
            Some(url) => Arc::new(WebhookRevalidator::new(url.clone())),
            None => Arc::new(LogRevalidator),
        };

        Self {
            orm,
            images,
            revalidator,
            session: SessionSettings {
                jwt_secret: config.jwt_secret.clone(),
                ttl_hours: config.session_ttl_hours,
            },
        }
    }
}
