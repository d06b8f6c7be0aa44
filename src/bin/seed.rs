use axum_bookstore_api::{
    config,
    db::{create_orm_conn, run_migrations},
    services::auth_service::hash_password,
};
use sqlx::PgPool;
use uuid::Uuid;

struct SeedBook {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    price: f64,
    rating: f64,
    pages: i32,
    beneficiary: &'static str,
    techs: &'static [&'static str],
}

const CATEGORIES: [&str; 3] = ["Backend", "Frontend", "DevOps"];

const BOOKS: [SeedBook; 4] = [
    SeedBook {
        name: "Async Rust in Practice",
        description: "Building network services with tokio and axum",
        category: "Backend",
        price: 24.0,
        rating: 4.5,
        pages: 312,
        beneficiary: "Backend developers",
        techs: &["Rust", "Tokio", "Axum"],
    },
    SeedBook {
        name: "Relational Data with SeaORM",
        description: "Entities, migrations and transactions",
        category: "Backend",
        price: 18.5,
        rating: 4.0,
        pages: 240,
        beneficiary: "Application developers",
        techs: &["Rust", "PostgreSQL"],
    },
    SeedBook {
        name: "Component Driven UIs",
        description: "Design systems from the ground up",
        category: "Frontend",
        price: 21.0,
        rating: 3.5,
        pages: 198,
        beneficiary: "Frontend developers",
        techs: &["TypeScript", "React"],
    },
    SeedBook {
        name: "Shipping Containers",
        description: "Images, registries and deploy pipelines",
        category: "DevOps",
        price: 0.0,
        rating: 5.0,
        pages: 150,
        beneficiary: "Platform teams",
        techs: &["Docker", "Kubernetes"],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = config::database_url()?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let admin_id = ensure_user_with_role(pool, "admin@example.com", "admin123", "ADMIN").await?;
    let user_id = ensure_user_with_role(pool, "user@example.com", "user123", "USER").await?;
    seed_categories(pool).await?;
    seed_books(pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user_with_role(
    pool: &PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn seed_categories(pool: &PgPool) -> anyhow::Result<()> {
    for name in CATEGORIES {
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(name)
            .execute(pool)
            .await?;
    }
    println!("Seeded categories");
    Ok(())
}

async fn seed_books(pool: &PgPool) -> anyhow::Result<()> {
    for (position, book) in BOOKS.iter().enumerate() {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(book.name)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        let (category_id,): (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE name = $1")
            .bind(book.category)
            .fetch_one(pool)
            .await?;

        let mut tx = pool.begin().await?;
        let product_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, image, price, rating, pages, beneficiary, sort_order, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product_id)
        .bind(book.name)
        .bind(book.description)
        .bind(format!("https://placehold.co/400x600?text={}", position + 1))
        .bind(book.price)
        .bind(book.rating)
        .bind(book.pages)
        .bind(book.beneficiary)
        .bind(position as i32)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;

        for tech in book.techs {
            sqlx::query("INSERT INTO product_techs (id, product_id, name) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(product_id)
                .bind(*tech)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
    }

    println!("Seeded books");
    Ok(())
}
