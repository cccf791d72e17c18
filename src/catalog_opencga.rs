//! OpenCGA catalog connector.
//!
//! Queries the OpenCGA REST API for samples and their files:
//!
//! - `GET {url}/webservices/rest/v1/samples/search?study=..&name=..&limit=..`
//! - `GET {url}/webservices/rest/v1/files/search?study=..&samples=<name>`
//!
//! Responses use the standard envelope
//! `{"response": [{"result": [...]}], "error": ""}`; results of every
//! response entry are concatenated.
//!
//! # Configuration
//!
//! ```toml
//! [catalog]
//! kind = "opencga"
//!
//! [catalog.opencga]
//! url = "https://opencga.example.org/opencga"
//! study = "1000000024"
//! paths_root = "/genomes"
//! ```
//!
//! # Environment Variables
//!
//! - `OPENCGA_TOKEN` (or the variable named by `token_env`): optional
//!   session token, sent as a bearer token.
//!
//! No retries are attempted: any HTTP, status or envelope error is returned
//! to the crawler.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use catalog_summary_core::models::{FileRecord, Sample};

use crate::catalog::Catalog;
use crate::config::OpenCgaCatalogConfig;

pub struct OpenCgaCatalog {
    config: OpenCgaCatalogConfig,
    client: reqwest::Client,
    token: Option<String>,
}

impl OpenCgaCatalog {
    pub fn new(config: OpenCgaCatalogConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Ok(Self {
            config,
            client,
            token,
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/webservices/rest/v1/{}/search",
            self.config.url.trim_end_matches('/'),
            resource
        )
    }

    async fn search(&self, resource: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
        let url = self.endpoint(resource);
        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("OpenCGA request failed: {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("OpenCGA returned {} for {}: {}", status, url, body);
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("OpenCGA returned invalid JSON for {}", url))?;
        extract_results(body)
    }
}

/// Pull the `result` arrays out of an OpenCGA response envelope.
pub fn extract_results(body: Value) -> Result<Vec<Value>> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        if !error.is_empty() {
            bail!("OpenCGA error: {}", error);
        }
    }
    let responses = match body.get("response") {
        Some(Value::Array(responses)) => responses,
        _ => bail!("OpenCGA response has no 'response' array"),
    };

    let mut results = Vec::new();
    for entry in responses {
        match entry.get("result") {
            Some(Value::Array(items)) => results.extend(items.iter().cloned()),
            _ => bail!("OpenCGA response entry has no 'result' array"),
        }
    }
    Ok(results)
}

/// Strip `root` and any leading `/` left behind from `path`; other paths are
/// returned unchanged.
///
/// | `path` (root `/genomes`) | Result |
/// |--------|--------|
/// | `/genomes/dir/file.txt` | `dir/file.txt` |
/// | `genomes/dir/file.txt` | `genomes/dir/file.txt` |
/// | `/dir/file.txt` | `/dir/file.txt` |
pub fn strip_paths_root(path: &str, root: &str) -> String {
    if root.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.trim_start_matches('/').to_string(),
        None => path.to_string(),
    }
}

#[async_trait]
impl Catalog for OpenCgaCatalog {
    fn name(&self) -> &str {
        "opencga"
    }

    async fn list_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        let results = self
            .search(
                "samples",
                &[
                    ("study", self.config.study.clone()),
                    ("name", self.config.sample_name_filter.clone()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        results
            .into_iter()
            .map(|value| {
                serde_json::from_value::<Sample>(value).context("OpenCGA sample without a name")
            })
            .collect()
    }

    async fn list_files_for_sample(&self, sample: &str) -> Result<Vec<FileRecord>> {
        let results = self
            .search(
                "files",
                &[
                    ("study", self.config.study.clone()),
                    ("samples", sample.to_string()),
                ],
            )
            .await?;

        let mut files = Vec::with_capacity(results.len());
        for value in results {
            let mut record = FileRecord::try_from(value)
                .with_context(|| format!("OpenCGA file for sample {}", sample))?;
            let stripped = strip_paths_root(&record.path, &self.config.paths_root);
            record
                .attributes
                .insert("path".to_string(), Value::String(stripped.clone()));
            record.path = stripped;
            files.push(record);
        }
        Ok(files)
    }
}
