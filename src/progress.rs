//! Crawl and aggregate progress reporting.
//!
//! Progress is emitted on **stderr** so stdout stays parseable for the
//! final report printed by each command.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Waiting for the catalog to list samples. Total unknown.
    Listing { catalog: String },
    /// Sample `n` of `total` is being crawled (or skipped).
    Crawling {
        sample: String,
        n: u64,
        total: u64,
        skipped: bool,
    },
    /// Stream `n` of `total` has been aggregated and persisted.
    Aggregating { n: u64, total: u64 },
}

/// Receives progress events from the crawler and the aggregator.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "crawl  1,234 / 5,000 samples  LP...".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Listing { catalog } => {
                format!("crawl {}  listing samples...\n", catalog)
            }
            ProgressEvent::Crawling {
                sample,
                n,
                total,
                skipped,
            } => format!(
                "crawl  {} / {} samples  {}{}\n",
                format_number(*n),
                format_number(*total),
                sample,
                if *skipped { " (already processed)" } else { "" }
            ),
            ProgressEvent::Aggregating { n, total } => format!(
                "aggregate  {} / {} streams\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Listing { catalog } => serde_json::json!({
                "event": "progress",
                "phase": "listing",
                "catalog": catalog
            }),
            ProgressEvent::Crawling {
                sample,
                n,
                total,
                skipped,
            } => serde_json::json!({
                "event": "progress",
                "phase": "crawling",
                "sample": sample,
                "n": n,
                "total": total,
                "skipped": skipped
            }),
            ProgressEvent::Aggregating { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "aggregating",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
