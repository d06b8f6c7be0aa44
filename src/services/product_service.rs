use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
    sea_query::{Expr, Func},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{ProductList, ReorderRequest},
    entity::{
        categories::{self, Entity as Categories},
        product_techs::{self, Entity as ProductTechs},
        products::{self, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, ProductDetail, ProductTech},
    response::{ApiResponse, Meta, SuccessFlag},
    revalidate::{self, ADMIN_MENU_ITEMS_PATH, MENU_PATH},
    routes::params::ProductQuery,
    state::AppState,
};

/// Display order: the admin-controlled `order` first, newest first within
/// the same slot.
pub(crate) fn catalog_order(
    select: sea_orm::Select<Products>,
) -> sea_orm::Select<Products> {
    select
        .order_by_asc(Column::SortOrder)
        .order_by_desc(Column::CreatedAt)
}

/// Attaches category and technology tags to each product row.
pub(crate) async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<products::Model>,
) -> AppResult<Vec<Product>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut category_ids: Vec<Uuid> = models.iter().map(|m| m.category_id).collect();
    category_ids.sort();
    category_ids.dedup();

    let mut techs: HashMap<Uuid, Vec<ProductTech>> = HashMap::new();
    for tech in ProductTechs::find()
        .filter(product_techs::Column::ProductId.is_in(ids))
        .order_by_asc(product_techs::Column::Name)
        .all(conn)
        .await?
    {
        techs
            .entry(tech.product_id)
            .or_default()
            .push(ProductTech { name: tech.name });
    }

    let categories: HashMap<Uuid, Category> = Categories::find()
        .filter(categories::Column::Id.is_in(category_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, Category::from(c)))
        .collect();

    Ok(models
        .into_iter()
        .map(|model| {
            let category = categories.get(&model.category_id).cloned();
            let tags = techs.remove(&model.id).unwrap_or_default();
            Product::from_parts(model, category, tags)
        })
        .collect())
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        condition = condition.add(
            Condition::any()
                .add(Expr::expr(Func::lower(Expr::col(Column::Name))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(Expr::col(Column::Description))).like(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    let models = catalog_order(Products::find().filter(condition))
        .all(&state.orm)
        .await?;
    let items = hydrate(&state.orm, models).await?;

    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: &str) -> AppResult<ApiResponse<ProductDetail>> {
    let id = Uuid::parse_str(id.trim())
        .map_err(|_| AppError::BadRequest("Invalid product id".to_string()))?;

    let model = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let product = hydrate(&state.orm, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Product"))?;

    Ok(ApiResponse::success(
        "Product",
        ProductDetail::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn reorder_products(
    state: &AppState,
    user: &AuthUser,
    payload: ReorderRequest,
) -> AppResult<ApiResponse<SuccessFlag>> {
    ensure_admin(user)?;
    if payload.order.is_empty() {
        return Ok(ApiResponse::success(
            "Products reordered",
            SuccessFlag::ok(),
            Some(Meta::empty()),
        ));
    }

    let txn = state.orm.begin().await?;
    for entry in &payload.order {
        let result = Products::update_many()
            .col_expr(Column::SortOrder, Expr::value(entry.order))
            .filter(Column::Id.eq(entry.id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::BadRequest(format!("Unknown product id {}", entry.id)));
        }
    }
    txn.commit().await?;

    tracing::info!(count = payload.order.len(), "products reordered");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_reorder",
        "products",
        serde_json::json!({ "count": payload.order.len() }),
    )
    .await;
    revalidate::signal(
        state.revalidator.as_ref(),
        vec![ADMIN_MENU_ITEMS_PATH.to_string(), MENU_PATH.to_string()],
    )
    .await;

    Ok(ApiResponse::success(
        "Products reordered",
        SuccessFlag::ok(),
        Some(Meta::empty()),
    ))
}
