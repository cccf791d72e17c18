//! Core data models shared by the crawler, the aggregator and the sinks.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator between the normalized file path and each attribute name in
/// an attribute key.
pub const KEY_SEPARATOR: char = ':';

/// A sample as listed by the external catalog.
///
/// Only `name` is interpreted; everything else the catalog returns is kept
/// as an opaque bag.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Sample {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Map::new(),
        }
    }
}

/// A file registered against a sample.
///
/// `attributes` holds the complete record as returned by the catalog,
/// including the `path` entry itself.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: String,
    pub attributes: Map<String, Value>,
}

impl TryFrom<Value> for FileRecord {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self> {
        let attributes = match value {
            Value::Object(map) => map,
            other => bail!("file record must be a JSON object, got: {}", other),
        };
        let path = attributes
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("file record has no string 'path' attribute"))?
            .to_string();
        Ok(Self { path, attributes })
    }
}

/// Value distribution of one attribute stream.
///
/// Serializes to the JSON stored in `plot_values`: a flat count array for
/// histograms and `[["label", count], ...]` for categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Distribution {
    Histogram(Vec<u64>),
    Categories(Vec<(String, u64)>),
}

impl Distribution {
    pub fn len(&self) -> usize {
        match self {
            Distribution::Histogram(counts) => counts.len(),
            Distribution::Categories(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of values represented by the distribution.
    pub fn total(&self) -> u64 {
        match self {
            Distribution::Histogram(counts) => counts.iter().sum(),
            Distribution::Categories(entries) => entries.iter().map(|(_, n)| n).sum(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Statistical summary of one attribute key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSummary {
    /// The attribute key, read back from the stream header.
    pub name: String,
    pub is_numeric: bool,
    pub min: f64,
    pub max: f64,
    /// Values excluded by the outlier detector. Always empty for categorical
    /// summaries.
    pub outliers: Vec<f64>,
    pub distribution: Distribution,
}

impl AggregatedSummary {
    /// The normalized file path: the part of `name` before the first
    /// [`KEY_SEPARATOR`].
    pub fn file_path(&self) -> &str {
        self.name
            .split(KEY_SEPARATOR)
            .next()
            .unwrap_or(self.name.as_str())
    }
}
