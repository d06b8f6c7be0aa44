use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

pub const MENU_PATH: &str = "/menu";
pub const ADMIN_MENU_ITEMS_PATH: &str = "/admin/menu-items";
pub const HOME_PATH: &str = "/";

#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, paths: &[String]) -> anyhow::Result<()>;
}

/// Paths affected by a product mutation.
pub fn product_paths(product_id: Option<Uuid>) -> Vec<String> {
    let mut paths = vec![MENU_PATH.to_string(), ADMIN_MENU_ITEMS_PATH.to_string()];
    if let Some(id) = product_id {
        paths.push(format!("{ADMIN_MENU_ITEMS_PATH}/{id}/edit"));
    }
    paths.push(HOME_PATH.to_string());
    paths
}

pub async fn signal(revalidator: &dyn Revalidator, paths: Vec<String>) {
    tracing::debug!(paths = ?paths, "revalidating paths");
    if let Err(err) = revalidator.revalidate(&paths).await {
        tracing::warn!(error = %err, paths = ?paths, "revalidation failed");
    }
}

/// Used when no frontend webhook is configured.
pub struct LogRevalidator;

#[async_trait]
impl Revalidator for LogRevalidator {
    async fn revalidate(&self, paths: &[String]) -> anyhow::Result<()> {
        tracing::info!(paths = %paths.join(", "), "revalidate requested");
        Ok(())
    }
}

#[derive(Serialize)]
struct RevalidatePayload<'a> {
    paths: &'a [String],
}

/// Posts `{"paths": [...]}` to the storefront's revalidation hook.
pub struct WebhookRevalidator {
    url: String,
    client: reqwest::Client,
}

impl WebhookRevalidator {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl Revalidator for WebhookRevalidator {
    async fn revalidate(&self, paths: &[String]) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&RevalidatePayload { paths })
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("revalidate hook returned {}", resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_paths_include_edit_page_when_keyed() {
        let id = Uuid::new_v4();
        let paths = product_paths(Some(id));
        assert_eq!(
            paths,
            vec![
                "/menu".to_string(),
                "/admin/menu-items".to_string(),
                format!("/admin/menu-items/{id}/edit"),
                "/".to_string(),
            ]
        );
        assert_eq!(product_paths(None).len(), 3);
    }
}
