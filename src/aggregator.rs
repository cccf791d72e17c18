//! Aggregation driver.
//!
//! Scans the summary directory, aggregates every accumulation stream on a
//! blocking worker and persists each summary through a [`SummarySink`] as
//! soon as it is ready. Streams are independent, so up to `concurrency` of
//! them are processed at once. The first failure aborts the pass; nothing
//! is checkpointed, a re-run starts over.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

use catalog_summary_core::aggregate::{
    aggregate_stream, AggregateOptions, NoOutliers, OutlierDetector,
};
use catalog_summary_core::models::AggregatedSummary;
use catalog_summary_core::sink::SummarySink;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::router::list_streams;
use crate::sqlite_sink::SqliteSink;

/// Counters for one aggregation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub streams: u64,
    pub numeric: u64,
    pub categorical: u64,
    /// Summaries persisted with a non-empty outlier set.
    pub suspicious: u64,
}

/// Classify and summarize the stream stored at `path`.
pub fn aggregate_file(
    path: &Path,
    options: &AggregateOptions,
    detector: &dyn OutlierDetector,
) -> Result<AggregatedSummary> {
    aggregate_stream(
        || {
            let file = File::open(path)
                .with_context(|| format!("Failed to open stream: {}", path.display()))?;
            Ok(BufReader::new(file))
        },
        options,
        detector,
    )
    .with_context(|| format!("Failed to aggregate stream: {}", path.display()))
}

/// Aggregate every stream in `dir` into `sink`.
pub async fn aggregate_dir(
    dir: &Path,
    options: AggregateOptions,
    concurrency: usize,
    detector: Arc<dyn OutlierDetector>,
    sink: &dyn SummarySink,
    progress: &dyn ProgressReporter,
) -> Result<AggregateReport> {
    let streams = list_streams(dir)?;
    let total = streams.len() as u64;
    let mut report = AggregateReport::default();
    tracing::info!(dir = %dir.display(), streams = total, "aggregating streams");

    let mut pending = streams.into_iter();
    let mut running: JoinSet<Result<(u64, AggregatedSummary)>> = JoinSet::new();
    let limit = concurrency.max(1);

    loop {
        while running.len() < limit {
            let Some((id, path)) = pending.next() else {
                break;
            };
            let detector = Arc::clone(&detector);
            running.spawn_blocking(move || {
                aggregate_file(&path, &options, detector.as_ref()).map(|s| (id, s))
            });
        }

        let Some(joined) = running.join_next().await else {
            break;
        };
        let (id, summary) = joined.context("aggregation worker failed")??;

        let attr_id = sink.persist(&summary).await?;
        tracing::info!(
            stream = id,
            attr_id,
            name = %summary.name,
            is_numeric = summary.is_numeric,
            min = summary.min,
            max = summary.max,
            entries = summary.distribution.len(),
            "aggregated attribute"
        );

        report.streams += 1;
        if summary.is_numeric {
            report.numeric += 1;
        } else {
            report.categorical += 1;
        }
        if !summary.outliers.is_empty() {
            report.suspicious += 1;
        }
        progress.report(ProgressEvent::Aggregating {
            n: report.streams,
            total,
        });
    }

    Ok(report)
}

/// Aggregate the configured summary directory into the SQLite database and
/// print a summary.
pub async fn run_aggregate(config: &Config, progress: &dyn ProgressReporter) -> Result<AggregateReport> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let sink = SqliteSink::new(pool);

    let report = aggregate_dir(
        &config.crawl.summary_dir,
        config.aggregate.options(),
        config.aggregate.concurrency,
        Arc::new(NoOutliers),
        &sink,
        progress,
    )
    .await?;

    println!("aggregate {}", config.crawl.summary_dir.display());
    println!("  streams: {}", report.streams);
    println!("  numeric: {}", report.numeric);
    println!("  categorical: {}", report.categorical);
    if report.suspicious > 0 {
        println!("  suspicious: {}", report.suspicious);
    }
    println!("ok");

    sink.pool().close().await;
    Ok(report)
}
