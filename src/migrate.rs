use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Creates the ledger schema. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            file_name TEXT PRIMARY KEY,
            satellite TEXT NOT NULL,
            locator TEXT NOT NULL,
            sha256 TEXT,
            size_bytes INTEGER,
            fetched_at INTEGER,
            processed_at INTEGER,
            processed_sha256 TEXT,
            run_label TEXT,
            record_count INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_datasets_satellite ON datasets(satellite)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}
