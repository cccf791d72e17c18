//! Resume ledger: the append-only list of fully crawled samples.
//!
//! The ledger file holds one sample name per line. It is read completely at
//! startup and only ever appended to. A sample is recorded after all of its
//! files have been written, so an interrupted crawl retries the whole
//! sample on the next run.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub struct ResumeLedger {
    path: PathBuf,
    processed: HashSet<String>,
    file: File,
}

impl ResumeLedger {
    /// Open (creating if needed) the ledger at `path` and load every
    /// recorded sample name.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create ledger directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .with_context(|| format!("Failed to open samples file: {}", path.display()))?;

        let mut processed = HashSet::new();
        for line in BufReader::new(&file).lines() {
            let line = line
                .with_context(|| format!("Failed to read samples file: {}", path.display()))?;
            let name = line.trim_end_matches('\r');
            if !name.is_empty() {
                processed.insert(name.to_string());
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            processed,
            file,
        })
    }

    /// Sample names recorded at `path`, without creating anything. A missing
    /// ledger is empty.
    pub fn recorded(path: &Path) -> Result<HashSet<String>> {
        if !path.exists() {
            return Ok(HashSet::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read samples file: {}", path.display()))?;
        Ok(content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, sample: &str) -> bool {
        self.processed.contains(sample)
    }

    /// Append `sample` to the ledger and flush. Names already present are
    /// not written twice.
    pub fn record(&mut self, sample: &str) -> Result<()> {
        if self.processed.contains(sample) {
            return Ok(());
        }
        writeln!(self.file, "{}", sample)
            .and_then(|_| self.file.flush())
            .with_context(|| format!("Failed to append to samples file: {}", self.path.display()))?;
        self.processed.insert(sample.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
