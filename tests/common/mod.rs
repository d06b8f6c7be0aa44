#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum_bookstore_api::{
    dto::products::ProductForm,
    entity::{self, cart_items},
    middleware::auth::AuthUser,
    models::Role,
    revalidate::Revalidator,
    services::auth_service::hash_password,
    state::{AppState, SessionSettings},
    storage::{ImageFile, ImageStore, ImageUploader, RetryPolicy, UploadError},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, Schema, sea_query::Index,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

/// Fails the first `failures` calls, then returns a URL built from the
/// folder and file name.
pub struct MockImageStore {
    failures: u32,
    calls: AtomicU32,
}

impl MockImageStore {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    fn backend_tag(&self) -> &'static str {
        "mock"
    }

    async fn put_image(&self, file: &ImageFile, folder: &str) -> Result<String, UploadError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(UploadError::Remote("HTTP 503 Service Unavailable".into()));
        }
        Ok(format!("https://cdn.test/{folder}/{}", file.file_name))
    }
}

#[derive(Default)]
pub struct RecordingRevalidator {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingRevalidator {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Revalidator for RecordingRevalidator {
    async fn revalidate(&self, paths: &[String]) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(paths.to_vec());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MockImageStore>,
    pub revalidator: Arc<RecordingRevalidator>,
}

/// Single-connection in-memory SQLite with the schema derived from the
/// entities, plus the cart ownership unique indexes.
pub async fn memory_db() -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let orm = Database::connect(opts).await?;

    let backend = orm.get_database_backend();
    let schema = Schema::new(backend);
    let tables = [
        schema.create_table_from_entity(entity::Categories),
        schema.create_table_from_entity(entity::Products),
        schema.create_table_from_entity(entity::ProductTechs),
        schema.create_table_from_entity(entity::Users),
        schema.create_table_from_entity(entity::CartItems),
        schema.create_table_from_entity(entity::AuditLogs),
    ];
    for table in tables {
        orm.execute(backend.build(&table)).await?;
    }

    let indexes = [
        Index::create()
            .name("uq_cart_items_user_product")
            .table(entity::CartItems)
            .col(cart_items::Column::UserId)
            .col(cart_items::Column::ProductId)
            .unique()
            .to_owned(),
        Index::create()
            .name("uq_cart_items_guest_product")
            .table(entity::CartItems)
            .col(cart_items::Column::GuestSessionId)
            .col(cart_items::Column::ProductId)
            .unique()
            .to_owned(),
    ];
    for index in indexes {
        orm.execute(backend.build(&index)).await?;
    }

    Ok(orm)
}

pub async fn test_app_with(failures: u32, retry: RetryPolicy) -> anyhow::Result<TestApp> {
    let orm = memory_db().await?;
    let store = Arc::new(MockImageStore::new(failures));
    let revalidator = Arc::new(RecordingRevalidator::default());

    let state = AppState {
        orm,
        images: ImageUploader::new(store.clone(), retry, "product_images"),
        revalidator: revalidator.clone(),
        session: SessionSettings {
            jwt_secret: JWT_SECRET.to_string(),
            ttl_hours: 1,
        },
    };

    Ok(TestApp {
        state,
        store,
        revalidator,
    })
}

/// Uploads never fail and retries do not sleep.
pub async fn test_app() -> anyhow::Result<TestApp> {
    test_app_with(
        0,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
    )
    .await
}

pub async fn seed_category(orm: &DatabaseConnection, name: &str) -> anyhow::Result<Uuid> {
    let model = entity::categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(model.id)
}

pub async fn seed_user(orm: &DatabaseConnection, email: &str, role: Role) -> anyhow::Result<AuthUser> {
    let model = entity::users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(Some("Test User".to_string())),
        email: Set(email.to_string()),
        password_hash: Set(hash_password("password123")?),
        role: Set(role.as_str().to_string()),
        image: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;
    Ok(AuthUser {
        user_id: model.id,
        role,
    })
}

pub async fn seed_admin(orm: &DatabaseConnection) -> anyhow::Result<AuthUser> {
    seed_user(orm, "admin@example.com", Role::Admin).await
}

pub fn png(name: &str, size: usize) -> ImageFile {
    ImageFile::new(name, "image/png", vec![7u8; size])
}

/// A form that passes validation for the given category.
pub fn product_form(category_id: Uuid, name: &str) -> ProductForm {
    ProductForm {
        name: Some(name.to_string()),
        description: Some(format!("{name} description")),
        beneficiary: Some("Developers".to_string()),
        category_id: Some(category_id.to_string()),
        price: Some("12.5".to_string()),
        rating: Some("4".to_string()),
        url: Some("https://example.com/book".to_string()),
        pages: Some("200".to_string()),
        product_techs: Some(r#"[{"name":"Rust"},{"name":"Axum"}]"#.to_string()),
        image: Some(png("cover.png", 1024)),
    }
}

pub fn bearer(user: &AuthUser) -> anyhow::Result<String> {
    let token = axum_bookstore_api::services::auth_service::issue_token(
        user.user_id,
        user.role,
        JWT_SECRET,
        1,
    )?;
    Ok(format!("Bearer {token}"))
}

/// One multipart part: field name, optional `(file name, content type)`, body.
pub type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a [u8]);

pub fn multipart_request(
    uri: &str,
    authorization: Option<&str>,
    parts: &[Part<'_>],
) -> anyhow::Result<axum::http::Request<axum::body::Body>> {
    const BOUNDARY: &str = "test-boundary";
    let mut body: Vec<u8> = Vec::new();
    for (name, file, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((file_name, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            axum::http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(value) = authorization {
        builder = builder.header(axum::http::header::AUTHORIZATION, value);
    }
    Ok(builder.body(axum::body::Body::from(body))?)
}
