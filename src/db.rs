use std::time::Duration;

use anyhow::Result;
use sea_orm::{DatabaseConnection, SqlxPostgresConnector};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Create the shared Postgres pool. Every pooled connection gets a bounded
/// statement timeout so a transaction stuck behind another writer errors out
/// instead of holding its row locks indefinitely.
pub async fn create_pool(database_url: &str, statement_timeout_ms: u64) -> Result<DbPool> {
    let timeout_stmt = format!("SET statement_timeout = {statement_timeout_ms}");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(move |conn, _meta| {
            let timeout_stmt = timeout_stmt.clone();
            Box::pin(async move {
                conn.execute(timeout_stmt.as_str()).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// SeaORM handle over the same sqlx pool, so raw queries and entity queries
/// draw from the same connections.
pub fn orm_from_pool(pool: &DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone())
}
