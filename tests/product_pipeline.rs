mod common;

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum_bookstore_api::{
    config::DEFAULT_BODY_LIMIT_BYTES,
    dto::cart::AddToCartRequest,
    entity::{cart_items, product_techs, products},
    error::AppError,
    middleware::identity::{CartIdentity, CartOwner},
    models::Role,
    revalidate,
    routes::app_router,
    services::{admin_service, cart_service},
    storage::{MAX_IMAGE_BYTES, RetryPolicy},
    validation::messages,
};
use http_body_util::BodyExt;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use common::{
    bearer, multipart_request, png, product_form, seed_admin, seed_category, seed_user, test_app,
    test_app_with,
};

async fn tech_names(
    orm: &sea_orm::DatabaseConnection,
    product_id: Uuid,
) -> anyhow::Result<BTreeSet<String>> {
    Ok(product_techs::Entity::find()
        .filter(product_techs::Column::ProductId.eq(product_id))
        .all(orm)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect())
}

#[tokio::test]
async fn add_product_persists_tags_and_signals() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let mut form = product_form(category, "Zero To Axum");
    form.product_techs = Some(r#"[{"name":"Rust"},{"name":" Tokio "},{"name":"Rust"}]"#.into());
    let created = admin_service::add_product(&app.state, &admin, form).await?.data.unwrap();

    assert_eq!(created.image, "https://cdn.test/product_images/cover.png");
    assert_eq!(created.category.as_ref().map(|c| c.id), Some(category));
    let stored = tech_names(&app.state.orm, created.id).await?;
    assert_eq!(stored, BTreeSet::from(["Rust".to_string(), "Tokio".to_string()]));

    assert_eq!(
        app.revalidator.calls(),
        vec![vec![
            "/menu".to_string(),
            "/admin/menu-items".to_string(),
            format!("/admin/menu-items/{}/edit", created.id),
            "/".to_string(),
        ]]
    );
    assert_eq!(app.store.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn negative_price_creates_nothing() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let mut form = product_form(category, "Broken");
    form.price = Some("-5".into());
    let result = admin_service::add_product(&app.state, &admin, form).await;

    let err = result.expect_err("negative price must fail");
    assert_eq!(
        err.fields().and_then(|f| f.get("price")).map(String::as_str),
        Some(messages::INVALID_PRICE)
    );
    assert_eq!(products::Entity::find().count(&app.state.orm).await?, 0);
    assert_eq!(app.store.calls(), 0);
    assert!(app.revalidator.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_image_never_reaches_the_store() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let mut form = product_form(category, "Huge Cover");
    form.image = Some(axum_bookstore_api::storage::ImageFile::new(
        "cover.jpg",
        "image/jpeg",
        vec![0u8; 20 * 1024 * 1024],
    ));
    assert!(20 * 1024 * 1024 > MAX_IMAGE_BYTES);

    let err = admin_service::add_product(&app.state, &admin, form)
        .await
        .expect_err("oversized image must fail");
    assert!(err.fields().is_some_and(|f| f.contains_key("image")));
    assert_eq!(app.store.calls(), 0);
    assert_eq!(products::Entity::find().count(&app.state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_category_is_a_field_error() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;

    let form = product_form(Uuid::new_v4(), "Orphan");
    let err = admin_service::add_product(&app.state, &admin, form)
        .await
        .expect_err("unknown category must fail");
    assert_eq!(
        err.fields().and_then(|f| f.get("categoryId")).map(String::as_str),
        Some(messages::UNKNOWN_CATEGORY)
    );
    assert_eq!(app.store.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn exhausted_upload_leaves_no_product() -> anyhow::Result<()> {
    let app = test_app_with(
        u32::MAX,
        axum_bookstore_api::storage::RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::ZERO,
        },
    )
    .await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let err = admin_service::add_product(&app.state, &admin, product_form(category, "Unlucky"))
        .await
        .expect_err("upload must fail");
    assert!(matches!(err, AppError::Upload(_)));
    assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.calls(), 3);
    assert_eq!(products::Entity::find().count(&app.state.orm).await?, 0);
    assert!(app.revalidator.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn non_admin_is_forbidden() -> anyhow::Result<()> {
    let app = test_app().await?;
    let user = seed_user(&app.state.orm, "reader@example.com", Role::User).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let err = admin_service::add_product(&app.state, &user, product_form(category, "Nope"))
        .await
        .expect_err("users cannot add products");
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn update_without_image_keeps_image_and_replaces_tags() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;
    let other_category = seed_category(&app.state.orm, "Frontend").await?;

    let created = admin_service::add_product(&app.state, &admin, product_form(category, "Original"))
        .await?
        .data
        .unwrap();

    let mut form = product_form(other_category, "Renamed");
    form.image = Some(png("", 0));
    form.pages = None;
    form.product_techs = Some(r#"[{"name":"SeaORM"}]"#.into());
    let updated = admin_service::update_product(&app.state, &admin, created.id, form)
        .await?
        .data
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.image, created.image);
    assert_eq!(updated.pages, created.pages);
    assert_eq!(updated.category_id, other_category);
    assert_eq!(
        tech_names(&app.state.orm, created.id).await?,
        BTreeSet::from(["SeaORM".to_string()])
    );
    assert_eq!(app.store.calls(), 1);

    let last = app.revalidator.calls().pop().unwrap();
    assert!(last.contains(&format!("/admin/menu-items/{}/edit", created.id)));
    Ok(())
}

#[tokio::test]
async fn update_with_new_image_uploads_it() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;
    let created = admin_service::add_product(&app.state, &admin, product_form(category, "Covered"))
        .await?
        .data
        .unwrap();

    let mut form = product_form(category, "Covered");
    form.image = Some(png("new-cover.png", 2048));
    let updated = admin_service::update_product(&app.state, &admin, created.id, form)
        .await?
        .data
        .unwrap();

    assert_eq!(updated.image, "https://cdn.test/product_images/new-cover.png");
    assert_eq!(app.store.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn update_missing_product_is_not_found() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let err = admin_service::update_product(&app.state, &admin, Uuid::new_v4(), product_form(category, "Ghost"))
        .await
        .expect_err("missing product");
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(app.store.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn delete_removes_tags_and_cart_snapshots() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;
    let created = admin_service::add_product(&app.state, &admin, product_form(category, "Doomed"))
        .await?
        .data
        .unwrap();

    cart_service::add_to_cart(
        &app.state,
        &CartIdentity(Some(CartOwner::Guest("g-1".into()))),
        AddToCartRequest {
            product_id: Some(created.id.to_string()),
            name: Some(created.name.clone()),
            image: Some(created.image.clone()),
            price: Some(created.price),
            category: Some("Backend".into()),
        },
    )
    .await?;

    admin_service::delete_product(&app.state, &admin, created.id).await?;

    assert!(products::Entity::find_by_id(created.id).one(&app.state.orm).await?.is_none());
    assert!(tech_names(&app.state.orm, created.id).await?.is_empty());
    let carts = cart_items::Entity::find()
        .filter(cart_items::Column::ProductId.eq(created.id))
        .count(&app.state.orm)
        .await?;
    assert_eq!(carts, 0);

    let err = admin_service::delete_product(&app.state, &admin, created.id)
        .await
        .expect_err("second delete");
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn delete_nonexistent_is_not_found() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;

    let err = admin_service::delete_product(&app.state, &admin, Uuid::new_v4())
        .await
        .expect_err("missing product");
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(app.revalidator.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn add_product_survives_two_failed_uploads() -> anyhow::Result<()> {
    let app = test_app_with(
        2,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        },
    )
    .await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?;

    let started = Instant::now();
    let created = admin_service::add_product(&app.state, &admin, product_form(category, "Persistent"))
        .await?
        .data
        .unwrap();

    // 100ms after the first failure, 200ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(app.store.calls(), 3);
    assert!(products::Entity::find_by_id(created.id).one(&app.state.orm).await?.is_some());
    assert_eq!(created.image, "https://cdn.test/product_images/cover.png");
    assert_eq!(
        app.revalidator.calls(),
        vec![revalidate::product_paths(Some(created.id))]
    );
    Ok(())
}

#[tokio::test]
async fn http_oversized_image_is_an_image_field_error() -> anyhow::Result<()> {
    let app = test_app().await?;
    let admin = seed_admin(&app.state.orm).await?;
    let category = seed_category(&app.state.orm, "Backend").await?.to_string();
    let router = app_router(app.state.clone(), DEFAULT_BODY_LIMIT_BYTES);

    let image = vec![0xFFu8; 20 * 1024 * 1024];
    let request = multipart_request(
        "/api/admin/products",
        Some(&bearer(&admin)?),
        &[
            ("name", None, &b"Huge Cover"[..]),
            ("description", None, &b"Too big to upload"[..]),
            ("beneficiary", None, &b"Nobody"[..]),
            ("categoryId", None, category.as_bytes()),
            ("price", None, &b"10"[..]),
            ("image", Some(("cover.jpg", "image/jpeg")), &image[..]),
        ],
    )?;
    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await?.to_bytes();
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["data"]["fields"]["image"], messages::INVALID_IMAGE);
    assert_eq!(app.store.calls(), 0);
    assert_eq!(products::Entity::find().count(&app.state.orm).await?, 0);
    Ok(())
}
