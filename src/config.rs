//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/catalog_summary.sqlite"
//!
//! [crawl]
//! summary_dir = "./data/summary"
//! samples_file = "./data/samples.txt"
//!
//! [catalog]
//! kind = "json"
//!
//! [catalog.json]
//! path = "./fixtures/catalog.json"
//! ```
//!
//! Every other setting has a default; see `config/catsum.example.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use catalog_summary_core::aggregate::{AggregateOptions, DEFAULT_INTERVALS, DEFAULT_MAX_CATEGORIES};
use catalog_summary_core::flatten::{
    FlattenOptions, DEFAULT_BLACKLISTED_ATTRIBUTES, DEFAULT_BLACKLISTED_FILE_ENDINGS,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub aggregate: AggregateConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    /// Directory holding one accumulation stream per attribute key.
    pub summary_dir: PathBuf,
    /// Resume ledger: one processed sample name per line.
    pub samples_file: PathBuf,
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    #[serde(default = "default_blacklisted_attributes")]
    pub blacklisted_attributes: Vec<String>,
    #[serde(default = "default_blacklisted_file_endings")]
    pub blacklisted_file_endings: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_open_streams")]
    pub max_open_streams: usize,
}

fn default_sample_limit() -> usize {
    100_000
}
fn default_blacklisted_attributes() -> Vec<String> {
    DEFAULT_BLACKLISTED_ATTRIBUTES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_blacklisted_file_endings() -> Vec<String> {
    DEFAULT_BLACKLISTED_FILE_ENDINGS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_open_streams() -> usize {
    256
}

impl CrawlConfig {
    pub fn flatten_options(&self) -> FlattenOptions {
        FlattenOptions::new(
            self.blacklisted_attributes.iter().cloned(),
            self.blacklisted_file_endings.iter().cloned(),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregateConfig {
    #[serde(default = "default_intervals")]
    pub intervals: usize,
    #[serde(default = "default_max_categories")]
    pub max_categories: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS,
            max_categories: DEFAULT_MAX_CATEGORIES,
            concurrency: default_concurrency(),
        }
    }
}

fn default_intervals() -> usize {
    DEFAULT_INTERVALS
}
fn default_max_categories() -> usize {
    DEFAULT_MAX_CATEGORIES
}
fn default_concurrency() -> usize {
    4
}

impl AggregateConfig {
    pub fn options(&self) -> AggregateOptions {
        AggregateOptions {
            intervals: self.intervals,
            max_categories: self.max_categories,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// `"json"` or `"opencga"`.
    pub kind: String,
    #[serde(default)]
    pub json: Option<JsonCatalogConfig>,
    #[serde(default)]
    pub opencga: Option<OpenCgaCatalogConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JsonCatalogConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenCgaCatalogConfig {
    /// Instance base URL, e.g. `https://host/opencga`.
    pub url: String,
    pub study: String,
    /// Prefix stripped from file paths reported by the catalog.
    #[serde(default = "default_paths_root")]
    pub paths_root: String,
    #[serde(default = "default_sample_name_filter")]
    pub sample_name_filter: String,
    /// Environment variable holding a session token. Unset means anonymous.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout. Unset means requests wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_paths_root() -> String {
    "/genomes".to_string()
}
fn default_sample_name_filter() -> String {
    "~LP".to_string()
}
fn default_token_env() -> String {
    "OPENCGA_TOKEN".to_string()
}

impl Config {
    /// A JSON-catalog configuration rooted at `data_dir`, with defaults for
    /// everything else.
    pub fn minimal(data_dir: &Path) -> Self {
        Self {
            db: DbConfig {
                path: data_dir.join("catalog_summary.sqlite"),
            },
            crawl: CrawlConfig {
                summary_dir: data_dir.join("summary"),
                samples_file: data_dir.join("samples.txt"),
                sample_limit: default_sample_limit(),
                blacklisted_attributes: default_blacklisted_attributes(),
                blacklisted_file_endings: default_blacklisted_file_endings(),
                exclude_globs: Vec::new(),
                max_open_streams: default_max_open_streams(),
            },
            aggregate: AggregateConfig::default(),
            catalog: CatalogConfig {
                kind: "json".to_string(),
                json: Some(JsonCatalogConfig {
                    path: data_dir.join("catalog.json"),
                }),
                opencga: None,
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.crawl.max_open_streams == 0 {
        anyhow::bail!("crawl.max_open_streams must be > 0");
    }

    if config.aggregate.intervals == 0 {
        anyhow::bail!("aggregate.intervals must be > 0");
    }
    if config.aggregate.max_categories < 2 {
        anyhow::bail!("aggregate.max_categories must be >= 2");
    }
    if config.aggregate.concurrency == 0 {
        anyhow::bail!("aggregate.concurrency must be > 0");
    }

    match config.catalog.kind.as_str() {
        "json" => {
            if config.catalog.json.is_none() {
                anyhow::bail!("catalog.kind is 'json' but [catalog.json] is missing");
            }
        }
        "opencga" => {
            if config.catalog.opencga.is_none() {
                anyhow::bail!("catalog.kind is 'opencga' but [catalog.opencga] is missing");
            }
        }
        other => anyhow::bail!(
            "Unknown catalog kind: '{}'. Must be json or opencga.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[db]
path = "/tmp/cs/db.sqlite"

[crawl]
summary_dir = "/tmp/cs/summary"
samples_file = "/tmp/cs/samples.txt"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{}{}", BASE, extra))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn defaults_fill_in() {
        let config = parse("[catalog]\nkind = \"json\"\n[catalog.json]\npath = \"c.json\"\n").unwrap();
        assert_eq!(config.crawl.sample_limit, 100_000);
        assert_eq!(config.crawl.blacklisted_attributes, vec!["path", "uri"]);
        assert_eq!(config.crawl.blacklisted_file_endings, vec!["log"]);
        assert_eq!(config.aggregate.intervals, 200);
        assert_eq!(config.aggregate.max_categories, 20);
    }

    #[test]
    fn opencga_defaults() {
        let config = parse(
            "[catalog]\nkind = \"opencga\"\n[catalog.opencga]\nurl = \"http://h/opencga\"\nstudy = \"s1\"\n",
        )
        .unwrap();
        let oc = config.catalog.opencga.unwrap();
        assert_eq!(oc.paths_root, "/genomes");
        assert_eq!(oc.sample_name_filter, "~LP");
        assert_eq!(oc.token_env, "OPENCGA_TOKEN");
        assert_eq!(oc.timeout_secs, None);

        let config = parse(
            "[catalog]\nkind = \"opencga\"\n[catalog.opencga]\nurl = \"http://h\"\nstudy = \"s1\"\ntimeout_secs = 90\n",
        )
        .unwrap();
        assert_eq!(config.catalog.opencga.unwrap().timeout_secs, Some(90));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse("[catalog]\nkind = \"ftp\"\n").is_err());
        assert!(parse("[catalog]\nkind = \"json\"\n").is_err());
        assert!(parse(
            "[aggregate]\nintervals = 0\n[catalog]\nkind = \"json\"\n[catalog.json]\npath = \"c\"\n"
        )
        .is_err());
        assert!(parse(
            "[aggregate]\nmax_categories = 1\n[catalog]\nkind = \"json\"\n[catalog.json]\npath = \"c\"\n"
        )
        .is_err());
    }
}
