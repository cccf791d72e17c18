//! Offline catalog backed by a JSON export.
//!
//! ```json
//! {
//!   "samples": [
//!     {
//!       "name": "LP1234567-DNA_A01",
//!       "files": [
//!         { "path": "/genomes/RAREP12345/LP1234567-DNA_A01/1/qc.json", "qc": { "pass": true } }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Sample order in the document is the listing order. Every file object
//! must carry a string `path`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use catalog_summary_core::models::{FileRecord, Sample};

use crate::catalog::Catalog;

#[derive(Deserialize)]
struct CatalogDocument {
    samples: Vec<SampleEntry>,
}

#[derive(Deserialize)]
struct SampleEntry {
    name: String,
    #[serde(default)]
    files: Vec<Value>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

pub struct JsonCatalog {
    entries: Vec<(Sample, Vec<FileRecord>)>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(content)?;
        let mut entries = Vec::with_capacity(document.samples.len());
        for entry in document.samples {
            let mut files = Vec::with_capacity(entry.files.len());
            for (i, file) in entry.files.into_iter().enumerate() {
                let record = FileRecord::try_from(file)
                    .with_context(|| format!("sample '{}', file #{}", entry.name, i))?;
                files.push(record);
            }
            let sample = Sample {
                name: entry.name,
                attributes: entry.attributes,
            };
            entries.push((sample, files));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    fn name(&self) -> &str {
        "json"
    }

    async fn list_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        Ok(self
            .entries
            .iter()
            .take(limit)
            .map(|(sample, _)| sample.clone())
            .collect())
    }

    async fn list_files_for_sample(&self, sample: &str) -> Result<Vec<FileRecord>> {
        let mut matches = self.entries.iter().filter(|(s, _)| s.name == sample);
        let (_, files) = matches
            .next()
            .ok_or_else(|| anyhow::anyhow!("Sample {} not found in catalog", sample))?;
        if matches.next().is_some() {
            anyhow::bail!("More than one sample found for name {}", sample);
        }
        Ok(files.clone())
    }
}
