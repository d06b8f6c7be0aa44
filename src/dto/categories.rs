use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Category, CategoryWithProducts};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    #[schema(value_type = Vec<Category>)]
    pub items: Vec<Category>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryCatalog {
    #[schema(value_type = Vec<CategoryWithProducts>)]
    pub items: Vec<CategoryWithProducts>,
}
