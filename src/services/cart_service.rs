use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, SqlErr,
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartList},
    entity::cart_items::{ActiveModel, Column, Entity as CartItems},
    error::{AppError, AppResult},
    middleware::identity::{CartIdentity, CartOwner},
    models::CartItem,
    response::{ApiResponse, Meta, SuccessFlag},
    state::AppState,
};

struct NewCartItem {
    product_id: Uuid,
    name: String,
    image: Option<String>,
    price: f64,
    category: Option<String>,
}

fn parse_add_request(payload: AddToCartRequest) -> AppResult<NewCartItem> {
    let missing = || AppError::BadRequest("Missing required fields".to_string());

    let product_id = payload
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(missing)?;
    let product_id = Uuid::parse_str(product_id)
        .map_err(|_| AppError::BadRequest("Invalid product id".to_string()))?;
    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(missing)?;
    let price = payload.price.filter(|p| p.is_finite()).ok_or_else(missing)?;

    Ok(NewCartItem {
        product_id,
        name,
        image: payload.image.filter(|v| !v.is_empty()),
        price,
        category: payload.category.filter(|v| !v.is_empty()),
    })
}

pub async fn list_cart(
    state: &AppState,
    identity: &CartIdentity,
) -> AppResult<ApiResponse<CartList>> {
    let Some(owner) = identity.owner() else {
        return Ok(ApiResponse::success(
            "OK",
            CartList { items: Vec::new() },
            Some(Meta::total(0)),
        ));
    };

    let items: Vec<CartItem> = CartItems::find()
        .filter(owner.condition())
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(CartItem::from)
        .collect();

    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

pub async fn add_to_cart(
    state: &AppState,
    identity: &CartIdentity,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let owner = identity.require()?;
    let item = parse_add_request(payload)?;

    let mut active = ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(item.product_id),
        name: Set(item.name),
        image: Set(item.image),
        price: Set(item.price),
        category: Set(item.category),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };
    owner.assign(&mut active);

    // The (owner, product) unique indexes make a duplicate add fail here
    // instead of relying on a prior lookup.
    let inserted = match active.insert(&state.orm).await {
        Ok(model) => model,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            tracing::debug!(owner = owner.kind(), product_id = %item.product_id, "cart conflict");
            return Err(AppError::Conflict("Product already in cart".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(owner = owner.kind(), product_id = %inserted.product_id, "added to cart");
    Ok(ApiResponse::success("Added to cart", CartItem::from(inserted), None))
}

pub async fn remove_from_cart(
    state: &AppState,
    identity: &CartIdentity,
    product_id: Option<&str>,
) -> AppResult<ApiResponse<SuccessFlag>> {
    let product_id = product_id
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("Product id is required".to_string()))?;
    let owner = identity.require()?;
    let product_id = Uuid::parse_str(product_id)
        .map_err(|_| AppError::NotFound("Product not found in cart".to_string()))?;

    let removed = remove_for_owner(state, owner, product_id).await?;
    if removed == 0 {
        return Err(AppError::NotFound("Product not found in cart".to_string()));
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        SuccessFlag::ok(),
        Some(Meta::empty()),
    ))
}

async fn remove_for_owner(state: &AppState, owner: &CartOwner, product_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(owner.condition())
        .filter(Column::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    Ok(result.rows_affected)
}
