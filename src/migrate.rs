use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the summary schema on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per aggregated attribute key
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attributes_summary (
            attr_id INTEGER PRIMARY KEY AUTOINCREMENT,
            plot_title TEXT NOT NULL,
            plot_minimum REAL NOT NULL,
            plot_maximum REAL NOT NULL,
            plot_values TEXT NOT NULL,
            is_numeric INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Summary → normalized file path
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files_attrs_table (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            attr_id INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            FOREIGN KEY (attr_id) REFERENCES attributes_summary(attr_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Attributes where the outlier detector excluded values
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suspicious_attributes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            attr_id INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            FOREIGN KEY (attr_id) REFERENCES attributes_summary(attr_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_files_attrs_file_path ON files_attrs_table(file_path)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attributes_summary_title ON attributes_summary(plot_title)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
