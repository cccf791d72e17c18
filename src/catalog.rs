//! Catalog capability consumed by the crawler.
//!
//! The crawler only needs two operations from the external catalog: list
//! samples and list the files registered against one sample. Both may fail;
//! failures are propagated unchanged and abort the crawl. Retries, if any,
//! belong to the implementation.
//!
//! # Implementations
//!
//! | Kind | Type | Source |
//! |------|------|--------|
//! | `json` | [`JsonCatalog`](crate::catalog_json::JsonCatalog) | Local JSON export |
//! | `opencga` | [`OpenCgaCatalog`](crate::catalog_opencga::OpenCgaCatalog) | OpenCGA REST API |

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use catalog_summary_core::models::{FileRecord, Sample};

use crate::catalog_json::JsonCatalog;
use crate::catalog_opencga::OpenCgaCatalog;
use crate::config::Config;

/// A source of samples and their file records.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use catalog_summary::catalog::Catalog;
/// use catalog_summary_core::models::{FileRecord, Sample};
///
/// struct Empty;
///
/// #[async_trait]
/// impl Catalog for Empty {
///     fn name(&self) -> &str { "empty" }
///
///     async fn list_samples(&self, _limit: usize) -> Result<Vec<Sample>> {
///         Ok(vec![])
///     }
///
///     async fn list_files_for_sample(&self, _sample: &str) -> Result<Vec<FileRecord>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Short label used in logs and progress output.
    fn name(&self) -> &str;

    /// List up to `limit` samples.
    async fn list_samples(&self, limit: usize) -> Result<Vec<Sample>>;

    /// List every file record associated with the named sample.
    async fn list_files_for_sample(&self, sample: &str) -> Result<Vec<FileRecord>>;
}

/// Build the catalog selected by `catalog.kind`.
pub fn build_catalog(config: &Config) -> Result<Box<dyn Catalog>> {
    match config.catalog.kind.as_str() {
        "json" => {
            let json = config
                .catalog
                .json
                .as_ref()
                .ok_or_else(|| anyhow!("JSON catalog not configured"))?;
            Ok(Box::new(JsonCatalog::load(&json.path)?))
        }
        "opencga" => {
            let opencga = config
                .catalog
                .opencga
                .as_ref()
                .ok_or_else(|| anyhow!("OpenCGA catalog not configured"))?;
            Ok(Box::new(OpenCgaCatalog::new(opencga.clone())?))
        }
        other => anyhow::bail!(
            "Unknown catalog kind: '{}'. Available: json, opencga",
            other
        ),
    }
}
