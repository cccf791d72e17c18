//! Catalog crawler.
//!
//! Pulls samples from the catalog, skips those already in the resume
//! ledger, flattens every file record of the remaining samples and routes
//! each leaf to its accumulation stream:
//!
//! ```text
//! list_samples ──▶ ledger? ──skip──▶ next sample
//!                     │
//!                     ▼
//!       list_files_for_sample ──▶ blacklisted? ──▶ flatten ──▶ router.append
//!                     │
//!                     ▼
//!            router.flush ──▶ ledger.record
//! ```
//!
//! A sample is recorded only after all of its files were written and
//! flushed. Any catalog or I/O error aborts the crawl; the interrupted
//! sample is crawled again on the next run.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

use catalog_summary_core::flatten::{flatten_record, FlattenOptions};
use catalog_summary_core::models::FileRecord;

use crate::catalog::{build_catalog, Catalog};
use crate::config::{Config, CrawlConfig};
use crate::ledger::ResumeLedger;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::router::StreamRouter;

pub struct CrawlOptions {
    pub sample_limit: usize,
    pub flatten: FlattenOptions,
    /// Extra file path globs skipped like blacklisted endings.
    pub exclude: GlobSet,
}

impl CrawlOptions {
    pub fn from_config(crawl: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            sample_limit: crawl.sample_limit,
            flatten: crawl.flatten_options(),
            exclude: build_globset(&crawl.exclude_globs)?,
        })
    }

    pub fn should_skip_file(&self, path: &str) -> bool {
        self.flatten.is_blacklisted_file(path) || self.exclude.is_match(path)
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            sample_limit: 100_000,
            flatten: FlattenOptions::default(),
            exclude: GlobSet::empty(),
        }
    }
}

/// Counters for one crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub samples_listed: u64,
    pub samples_skipped: u64,
    pub samples_crawled: u64,
    pub files_processed: u64,
    pub files_blacklisted: u64,
    pub leaves_written: u64,
    pub streams_created: u64,
}

pub struct Crawler<'a> {
    catalog: &'a dyn Catalog,
    router: StreamRouter,
    ledger: ResumeLedger,
    options: CrawlOptions,
}

impl<'a> Crawler<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        router: StreamRouter,
        ledger: ResumeLedger,
        options: CrawlOptions,
    ) -> Self {
        Self {
            catalog,
            router,
            ledger,
            options,
        }
    }

    pub fn ledger(&self) -> &ResumeLedger {
        &self.ledger
    }

    pub fn router(&self) -> &StreamRouter {
        &self.router
    }

    /// Crawl every unseen sample returned by the catalog.
    pub async fn summarize(&mut self, progress: &dyn ProgressReporter) -> Result<CrawlReport> {
        let mut report = CrawlReport::default();
        let created_before = self.router.created_this_run();

        tracing::info!(catalog = self.catalog.name(), "getting samples");
        progress.report(ProgressEvent::Listing {
            catalog: self.catalog.name().to_string(),
        });
        let samples = self.catalog.list_samples(self.options.sample_limit).await?;
        let total = samples.len() as u64;
        report.samples_listed = total;
        tracing::info!(count = total, "got samples, proceeding");

        for (i, sample) in samples.iter().enumerate() {
            let name = sample.name.as_str();
            let skipped = self.ledger.contains(name);
            progress.report(ProgressEvent::Crawling {
                sample: name.to_string(),
                n: i as u64 + 1,
                total,
                skipped,
            });
            if skipped {
                tracing::info!(sample = name, "sample was already processed, ignoring it");
                report.samples_skipped += 1;
                continue;
            }

            tracing::info!(sample = name, "getting files for sample");
            let files = self.catalog.list_files_for_sample(name).await?;
            tracing::info!(sample = name, files = files.len(), "got files for sample");

            for file in &files {
                self.process_file(file, &mut report)?;
            }
            self.router.flush()?;
            self.ledger.record(name)?;
            report.samples_crawled += 1;
        }

        report.streams_created = (self.router.created_this_run() - created_before) as u64;
        Ok(report)
    }

    fn process_file(&mut self, file: &FileRecord, report: &mut CrawlReport) -> Result<()> {
        if self.options.should_skip_file(&file.path) {
            tracing::debug!(path = %file.path, "skipping blacklisted file");
            report.files_blacklisted += 1;
            return Ok(());
        }
        let router = &mut self.router;
        let leaves = flatten_record(file, &self.options.flatten, |key, value| {
            router.append(key, value)
        })?;
        tracing::debug!(path = %file.path, leaves, "flattened file");
        report.files_processed += 1;
        report.leaves_written += leaves as u64;
        Ok(())
    }

    /// Flush and release all stream writers.
    pub fn finish(self) -> Result<()> {
        self.router.close()
    }
}

/// Run a crawl as configured and print a summary.
pub async fn run_crawl(
    config: &Config,
    limit: Option<usize>,
    progress: &dyn ProgressReporter,
) -> Result<CrawlReport> {
    let catalog = build_catalog(config)?;
    let mut options = CrawlOptions::from_config(&config.crawl)?;
    if let Some(limit) = limit {
        options.sample_limit = limit;
    }
    let router = StreamRouter::open(&config.crawl.summary_dir, config.crawl.max_open_streams)?;
    let ledger = ResumeLedger::open(&config.crawl.samples_file)?;

    let mut crawler = Crawler::new(catalog.as_ref(), router, ledger, options);
    let report = crawler.summarize(progress).await?;
    let streams_total = crawler.router().stream_count();
    crawler.finish()?;

    println!("crawl {}", catalog.name());
    println!("  samples listed: {}", report.samples_listed);
    println!("  samples skipped: {}", report.samples_skipped);
    println!("  samples crawled: {}", report.samples_crawled);
    println!("  files processed: {}", report.files_processed);
    println!("  files blacklisted: {}", report.files_blacklisted);
    println!("  values written: {}", report.leaves_written);
    println!("  streams created: {}", report.streams_created);
    println!("  streams total: {}", streams_total);
    println!("ok");

    Ok(report)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_globs_skip_files() {
        let crawl = CrawlConfig {
            summary_dir: "s".into(),
            samples_file: "l".into(),
            sample_limit: 10,
            blacklisted_attributes: vec![],
            blacklisted_file_endings: vec!["log".to_string()],
            exclude_globs: vec!["**/*.tmp".to_string()],
            max_open_streams: 4,
        };
        let options = CrawlOptions::from_config(&crawl).unwrap();
        assert!(options.should_skip_file("/a/b/c.tmp"));
        assert!(options.should_skip_file("/a/b/run.log"));
        assert!(!options.should_skip_file("/a/b/qc.json"));
    }
}
