//! In-memory [`SummarySink`] for tests and dry runs.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::AggregatedSummary;

use super::{PathAssociation, SummaryRecord, SummarySink};

#[derive(Default)]
struct Tables {
    summaries: Vec<SummaryRecord>,
    paths: Vec<PathAssociation>,
    suspicious: Vec<PathAssociation>,
}

/// Keeps every persisted record in memory, ids start at 1.
#[derive(Default)]
pub struct MemorySink {
    tables: RwLock<Tables>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> Vec<SummaryRecord> {
        self.tables
            .read()
            .map(|t| t.summaries.clone())
            .unwrap_or_default()
    }

    pub fn path_associations(&self) -> Vec<PathAssociation> {
        self.tables
            .read()
            .map(|t| t.paths.clone())
            .unwrap_or_default()
    }

    /// Attributes persisted with a non-empty outlier set.
    pub fn suspicious(&self) -> Vec<PathAssociation> {
        self.tables
            .read()
            .map(|t| t.suspicious.clone())
            .unwrap_or_default()
    }

    pub fn find(&self, title: &str) -> Option<SummaryRecord> {
        self.summaries().into_iter().find(|s| s.title == title)
    }
}

#[async_trait]
impl SummarySink for MemorySink {
    async fn persist(&self, summary: &AggregatedSummary) -> Result<i64> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;
        let id = tables.summaries.len() as i64 + 1;
        // Build everything before touching the tables so a failure leaves
        // them unchanged.
        let record = SummaryRecord::from_summary(id, summary)?;
        let association = PathAssociation {
            attr_id: id,
            file_path: summary.file_path().to_string(),
        };
        if !summary.outliers.is_empty() {
            tables.suspicious.push(association.clone());
        }
        tables.summaries.push(record);
        tables.paths.push(association);
        Ok(id)
    }
}
