use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{cart_items, categories, products, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: Role::parse(&model.role).unwrap_or(Role::User),
            image: model.image,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductTech {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image: String,
    pub price: f64,
    pub rating: f64,
    pub url: Option<String>,
    pub pages: Option<i32>,
    pub beneficiary: String,
    pub order: i32,
    pub category_id: Uuid,
    pub category: Option<Category>,
    pub product_techs: Vec<ProductTech>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_parts(
        model: products::Model,
        category: Option<Category>,
        techs: Vec<ProductTech>,
    ) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            image: model.image,
            price: model.price,
            rating: model.rating,
            url: model.url,
            pages: model.pages,
            beneficiary: model.beneficiary,
            order: model.sort_order,
            category_id: model.category_id,
            category,
            product_techs: techs,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

/// Shape returned by the product detail endpoint: category flattened to its name.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub price: f64,
    pub description: String,
    pub rating: f64,
    pub url: Option<String>,
    pub category: Option<String>,
    pub product_techs: Vec<ProductTech>,
    pub beneficiary: String,
    pub pages: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductDetail {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            image: p.image,
            price: p.price,
            description: p.description,
            rating: p.rating,
            url: p.url,
            category: p.category.map(|c| c.name),
            product_techs: p.product_techs,
            beneficiary: p.beneficiary,
            pages: p.pages,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithProducts {
    pub id: Uuid,
    pub name: String,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub user_id: Option<Uuid>,
    pub guest_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            name: model.name,
            image: model.image,
            price: model.price,
            category: model.category,
            user_id: model.user_id,
            guest_session_id: model.guest_session_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
