//! Destination for aggregated summaries.
//!
//! Every summary is persisted as a *summary record* plus a *path
//! association* linking the summary id to the normalized file path.
//! Implementations must write both as one unit: either both records exist
//! afterwards or neither does.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::AggregatedSummary;

/// A stored summary record, as handed back by sinks that can be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub id: i64,
    pub title: String,
    pub minimum: f64,
    pub maximum: f64,
    /// JSON-encoded distribution.
    pub values: String,
    pub is_numeric: bool,
}

/// Links a summary record to the file path it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAssociation {
    pub attr_id: i64,
    pub file_path: String,
}

impl SummaryRecord {
    pub fn from_summary(id: i64, summary: &AggregatedSummary) -> Result<Self> {
        Ok(Self {
            id,
            title: summary.name.clone(),
            minimum: summary.min,
            maximum: summary.max,
            values: summary.distribution.to_json()?,
            is_numeric: summary.is_numeric,
        })
    }
}

/// Abstract summary storage.
#[async_trait]
pub trait SummarySink: Send + Sync {
    /// Write the summary and its path association atomically.
    ///
    /// Returns the id assigned to the summary record.
    async fn persist(&self, summary: &AggregatedSummary) -> Result<i64>;
}
