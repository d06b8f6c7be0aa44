use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, SqlErr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::categories::{CategoryCatalog, CategoryList, CreateCategoryRequest},
    entity::{
        categories::{self, Column, Entity as Categories},
        products::{self, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, CategoryWithProducts, Product},
    response::{ApiResponse, Meta, SuccessFlag},
    revalidate::{self, MENU_PATH},
    services::product_service::{catalog_order, hydrate},
    state::AppState,
};

pub async fn list_catalog(state: &AppState) -> AppResult<ApiResponse<CategoryCatalog>> {
    let categories = Categories::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?;
    let products = hydrate(&state.orm, catalog_order(Products::find()).all(&state.orm).await?).await?;

    let mut by_category: HashMap<Uuid, Vec<Product>> = HashMap::new();
    for product in products {
        by_category.entry(product.category_id).or_default().push(product);
    }

    let items: Vec<CategoryWithProducts> = categories
        .into_iter()
        .map(|c| CategoryWithProducts {
            products: by_category.remove(&c.id).unwrap_or_default(),
            id: c.id,
            name: c.name,
        })
        .collect();

    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Categories", CategoryCatalog { items }, Some(meta)))
}

pub async fn list_categories(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CategoryList>> {
    ensure_admin(user)?;
    let items: Vec<Category> = Categories::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Categories", CategoryList { items }, Some(meta)))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::field("name", "Category name is required"));
    }

    let inserted = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await;
    let category = match inserted {
        Ok(model) => model,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("Category already exists".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id, "name": category.name }),
    )
    .await;
    revalidate::signal(state.revalidator.as_ref(), vec![MENU_PATH.to_string()]).await;

    Ok(ApiResponse::success("Category created", Category::from(category), Some(Meta::empty())))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<SuccessFlag>> {
    ensure_admin(user)?;

    Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let in_use = Products::find()
        .filter(products::Column::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Category still has {in_use} product(s)"
        )));
    }

    Categories::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;
    revalidate::signal(state.revalidator.as_ref(), vec![MENU_PATH.to_string()]).await;

    Ok(ApiResponse::success("Category deleted", SuccessFlag::ok(), Some(Meta::empty())))
}
