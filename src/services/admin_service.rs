// Product writes run validate, upload, persist (one transaction), then revalidate.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{products::ProductForm, users::UpdateRoleRequest},
    entity::{
        cart_items::{self, Entity as CartItems},
        categories::{self, Entity as Categories},
        product_techs::{self, Entity as ProductTechs},
        products::{self, Entity as Products},
        users::{self, Entity as Users},
    },
    error::{AppError, AppResult, FieldErrors},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, ProductTech, User},
    response::{ApiResponse, Meta, SuccessFlag},
    revalidate::{self, product_paths},
    state::AppState,
    validation::{ImageRule, ValidatedProduct, messages, parse_category_id, validate_product},
};

fn invalid_form(fields: FieldErrors) -> AppError {
    AppError::Validation {
        message: "Invalid form data".to_string(),
        fields,
    }
}

async fn find_category<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> AppResult<Option<categories::Model>> {
    Ok(Categories::find_by_id(id).one(conn).await?)
}

async fn require_category<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<categories::Model> {
    find_category(conn, id)
        .await?
        .ok_or_else(|| AppError::field("categoryId", messages::UNKNOWN_CATEGORY))
}

async fn insert_techs(txn: &DatabaseTransaction, product_id: Uuid, names: &[String]) -> AppResult<()> {
    if names.is_empty() {
        return Ok(());
    }
    let rows = names.iter().map(|name| product_techs::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        name: Set(name.clone()),
    });
    ProductTechs::insert_many(rows).exec(txn).await?;
    Ok(())
}

fn tech_models(names: &[String]) -> Vec<ProductTech> {
    let mut techs: Vec<ProductTech> = names
        .iter()
        .map(|name| ProductTech { name: name.clone() })
        .collect();
    techs.sort_by(|a, b| a.name.cmp(&b.name));
    techs
}

/// Checks the category reference and the form together so that an unknown
/// category is reported alongside any other field error.
async fn validate_new_product(state: &AppState, form: &ProductForm) -> AppResult<(ValidatedProduct, categories::Model)> {
    let category_id = parse_category_id(form.category_id.as_deref()).ok();
    let category = match category_id {
        Some(id) => find_category(&state.orm, id).await?,
        None => None,
    };
    let unknown_category = category_id.is_some() && category.is_none();

    match (validate_product(form, ImageRule::Required), category) {
        (Ok(product), Some(category)) => Ok((product, category)),
        (Ok(_), None) => Err(AppError::field("categoryId", messages::UNKNOWN_CATEGORY)),
        (Err(mut fields), _) => {
            if unknown_category {
                fields.insert("categoryId".to_string(), messages::UNKNOWN_CATEGORY.to_string());
            }
            Err(invalid_form(fields))
        }
    }
}

pub async fn add_product(
    state: &AppState,
    user: &AuthUser,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let (product, category) = validate_new_product(state, &form).await?;

    let Some(image) = product.image.as_ref() else {
        return Err(AppError::field("image", messages::REQUIRED_IMAGE));
    };
    let image_url = state.images.upload(image).await?;

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let model = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(product.name.clone()),
        description: Set(product.description.clone()),
        image: Set(image_url),
        price: Set(product.price),
        rating: Set(product.rating),
        url: Set(product.url.clone()),
        pages: Set(product.pages),
        beneficiary: Set(product.beneficiary.clone()),
        sort_order: Set(0),
        category_id: Set(category.id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;
    insert_techs(&txn, model.id, &product.techs).await?;
    txn.commit().await?;

    tracing::info!(product_id = %model.id, techs = product.techs.len(), "product created");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": model.id, "name": model.name }),
    )
    .await;
    revalidate::signal(state.revalidator.as_ref(), product_paths(Some(model.id))).await;

    let created = Product::from_parts(model, Some(Category::from(category)), tech_models(&product.techs));
    Ok(ApiResponse::success("Product created", created, Some(Meta::empty())))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let product = validate_product(&form, ImageRule::Optional).map_err(invalid_form)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    let category = require_category(&state.orm, product.category_id).await?;

    let new_image = match product.image.as_ref() {
        Some(file) => Some(state.images.upload(file).await?),
        None => None,
    };

    let txn = state.orm.begin().await?;
    let mut active: products::ActiveModel = existing.into();
    active.name = Set(product.name.clone());
    active.description = Set(product.description.clone());
    active.beneficiary = Set(product.beneficiary.clone());
    active.price = Set(product.price);
    active.rating = Set(product.rating);
    active.url = Set(product.url.clone());
    active.category_id = Set(category.id);
    if let Some(url) = new_image {
        active.image = Set(url);
    }
    if let Some(pages) = product.pages {
        active.pages = Set(Some(pages));
    }
    active.updated_at = Set(Utc::now().into());
    let model = active.update(&txn).await?;

    ProductTechs::delete_many()
        .filter(product_techs::Column::ProductId.eq(id))
        .exec(&txn)
        .await?;
    insert_techs(&txn, id, &product.techs).await?;
    txn.commit().await?;

    tracing::info!(product_id = %id, techs = product.techs.len(), "product updated");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;
    revalidate::signal(state.revalidator.as_ref(), product_paths(Some(id))).await;

    let updated = Product::from_parts(model, Some(Category::from(category)), tech_models(&product.techs));
    Ok(ApiResponse::success("Product updated", updated, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<SuccessFlag>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    ProductTechs::delete_many()
        .filter(product_techs::Column::ProductId.eq(id))
        .exec(&txn)
        .await?;
    let carts = CartItems::delete_many()
        .filter(cart_items::Column::ProductId.eq(id))
        .exec(&txn)
        .await?;
    Products::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(product_id = %id, cart_rows = carts.rows_affected, "product deleted");
    audit::record(
        &state.orm,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id, "name": existing.name }),
    )
    .await;
    revalidate::signal(state.revalidator.as_ref(), product_paths(None)).await;

    Ok(ApiResponse::success(
        "Product deleted",
        SuccessFlag::ok(),
        Some(Meta::empty()),
    ))
}

pub async fn set_user_role(
    state: &AppState,
    user: &AuthUser,
    target_id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    let target = Users::find_by_id(target_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: users::ActiveModel = target.into();
    active.role = Set(payload.role.as_str().to_string());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "user_role_update",
        "users",
        serde_json::json!({ "user_id": target_id, "role": payload.role.as_str() }),
    )
    .await;

    Ok(ApiResponse::success("Role updated", User::from(updated), Some(Meta::empty())))
}
