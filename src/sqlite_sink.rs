//! SQLite-backed [`SummarySink`].
//!
//! Each summary becomes one `attributes_summary` row and one
//! `files_attrs_table` row (plus a `suspicious_attributes` row when outliers
//! were excluded), all inside a single transaction.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use catalog_summary_core::models::AggregatedSummary;
use catalog_summary_core::sink::SummarySink;

pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SummarySink for SqliteSink {
    async fn persist(&self, summary: &AggregatedSummary) -> Result<i64> {
        let values = summary.distribution.to_json()?;
        let file_path = summary.file_path();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let attr_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO attributes_summary
                (plot_title, plot_minimum, plot_maximum, plot_values, is_numeric, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING attr_id
            "#,
        )
        .bind(&summary.name)
        .bind(summary.min)
        .bind(summary.max)
        .bind(&values)
        .bind(summary.is_numeric)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO files_attrs_table (attr_id, file_path) VALUES (?, ?)")
            .bind(attr_id)
            .bind(file_path)
            .execute(&mut *tx)
            .await?;

        if !summary.outliers.is_empty() {
            sqlx::query("INSERT INTO suspicious_attributes (attr_id, file_path) VALUES (?, ?)")
                .bind(attr_id)
                .bind(file_path)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(attr_id)
    }
}
