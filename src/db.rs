use std::time::{Duration, Instant};

use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub type OrmConn = DatabaseConnection;

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(database_url.to_owned());
    opts.max_connections(20)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let conn = Database::connect(opts).await?;
    Ok(conn)
}

/// Apply `migrations/` through sqlx's migrator on the pool backing the
/// SeaORM connection.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let pool = conn.get_postgres_connection_pool();
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbHealth {
    pub healthy: bool,
    pub latency: Duration,
}

pub async fn check_connection(conn: &DatabaseConnection) -> DbHealth {
    let started = Instant::now();
    match conn.ping().await {
        Ok(()) => DbHealth {
            healthy: true,
            latency: started.elapsed(),
        },
        Err(err) => {
            let latency = started.elapsed();
            tracing::error!(error = %err, latency_ms = latency.as_millis() as u64, "database health check failed");
            DbHealth {
                healthy: false,
                latency,
            }
        }
    }
}
