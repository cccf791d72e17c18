//! Summary database and crawl state overview.
//!
//! Used by `catsum stats` to show what has been crawled and aggregated.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::ledger::ResumeLedger;
use crate::migrate;
use crate::router::list_streams;

/// Counts gathered from the summary database.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SummaryStats {
    pub summaries: i64,
    pub attributes: i64,
    pub numeric: i64,
    pub categorical: i64,
    pub file_paths: i64,
    pub suspicious: i64,
    pub last_aggregated: Option<i64>,
}

pub async fn collect_stats(pool: &sqlx::SqlitePool) -> Result<SummaryStats> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS summaries,
            COUNT(DISTINCT plot_title) AS attributes,
            COUNT(DISTINCT CASE WHEN is_numeric THEN plot_title END) AS numeric_count,
            COUNT(DISTINCT CASE WHEN NOT is_numeric THEN plot_title END) AS categorical_count,
            MAX(created_at) AS last_aggregated
        FROM attributes_summary
        "#,
    )
    .fetch_one(pool)
    .await?;

    let file_paths: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT file_path) FROM files_attrs_table")
        .fetch_one(pool)
        .await?;
    let suspicious: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT file_path) FROM suspicious_attributes")
            .fetch_one(pool)
            .await?;

    Ok(SummaryStats {
        summaries: row.get("summaries"),
        attributes: row.get("attributes"),
        numeric: row.get("numeric_count"),
        categorical: row.get("categorical_count"),
        file_paths,
        suspicious,
        last_aggregated: row.get("last_aggregated"),
    })
}

/// Run the stats command: query the database and crawl state and print a
/// summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let stats = collect_stats(&pool).await?;

    let samples_done = ResumeLedger::recorded(&config.crawl.samples_file)?.len();
    let streams = if config.crawl.summary_dir.exists() {
        list_streams(&config.crawl.summary_dir)?.len()
    } else {
        0
    };
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Catalog Summary: Stats");
    println!("=======================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Samples done: {}", samples_done);
    println!("  Streams:      {}", streams);
    println!();
    println!("  Attributes:   {}", stats.attributes);
    println!("    numeric:     {}", stats.numeric);
    println!("    categorical: {}", stats.categorical);
    println!("  File paths:   {}", stats.file_paths);
    println!("  Suspicious:   {}", stats.suspicious);
    println!("  Summary rows: {}", stats.summaries);
    println!(
        "  Last run:     {}",
        match stats.last_aggregated {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
