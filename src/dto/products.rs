use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::upload::read_image_field,
    error::{AppError, AppResult},
    models::Product,
    storage::ImageFile,
    validation::messages,
};

/// Raw admin product form, as submitted. Validation lives in
/// [`crate::validation`].
#[derive(Debug, Default, Clone)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub beneficiary: Option<String>,
    pub category_id: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub url: Option<String>,
    pub pages: Option<String>,
    /// JSON array of `{"name": ...}` objects.
    pub product_techs: Option<String>,
    pub image: Option<ImageFile>,
}

impl ProductForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ProductForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "image" {
                let image = read_image_field(field).await.map_err(|err| match err {
                    AppError::Validation { .. } => AppError::field("image", messages::INVALID_IMAGE),
                    other => other,
                })?;
                form.image = Some(image);
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let slot = match name.as_str() {
                "name" => &mut form.name,
                "description" => &mut form.description,
                "beneficiary" => &mut form.beneficiary,
                "categoryId" => &mut form.category_id,
                "price" => &mut form.price,
                "rating" => &mut form.rating,
                "url" => &mut form.url,
                "pages" => &mut form.pages,
                "productTechs" => &mut form.product_techs,
                other => {
                    tracing::debug!(field = other, "ignoring unknown form field");
                    continue;
                }
            };
            *slot = Some(value);
        }
        Ok(form)
    }
}

/// Multipart body of the admin product endpoints; documentation only.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductFormSchema {
    pub name: String,
    pub description: String,
    pub beneficiary: String,
    pub category_id: Uuid,
    pub price: String,
    pub rating: Option<String>,
    pub url: Option<String>,
    pub pages: Option<String>,
    /// JSON encoded `[{"name": "..."}]`
    pub product_techs: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReorderEntry {
    pub id: Uuid,
    pub order: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub order: Vec<ReorderEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
