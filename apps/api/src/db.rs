use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const ACTIVITY_LOG_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS activity_log (
    id          UUID PRIMARY KEY,
    type        TEXT NOT NULL,
    description TEXT NOT NULL,
    metadata    JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_by  TEXT NOT NULL,
    timestamp   TIMESTAMPTZ NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const ACTIVITY_LOG_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS activity_log_type_created_idx ON activity_log (type, created_at DESC)";

/// Creates a PostgreSQL connection pool and makes sure the activity table exists.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::query(ACTIVITY_LOG_DDL)
        .execute(&pool)
        .await
        .context("failed to create activity_log table")?;
    sqlx::query(ACTIVITY_LOG_INDEX)
        .execute(&pool)
        .await
        .context("failed to create activity_log index")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}
