//! Key-to-stream routing.
//!
//! Every distinct attribute key owns one accumulation stream: a file in the
//! summary directory named by an integer id assigned in first-seen order.
//! A new stream starts with the key on its first line and a blank line; each
//! [`append`](StreamRouter::append) adds one value line.
//!
//! The key → id map is re-derived from the stream headers when the router
//! is opened, so later runs append to the streams of earlier runs and new
//! keys continue the id sequence.
//!
//! Writers are kept in a bounded arena. When more than `max_open` streams
//! are live, the least recently used writer is flushed and closed; it is
//! reopened in append mode on its next use. Lines for one key are therefore
//! always written in call order.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

struct OpenStream {
    writer: BufWriter<File>,
    last_used: u64,
}

pub struct StreamRouter {
    dir: PathBuf,
    ids: HashMap<String, u64>,
    next_id: u64,
    handles: HashMap<u64, OpenStream>,
    max_open: usize,
    clock: u64,
    created: usize,
}

/// Stream ids in `dir`: every regular file whose name is an integer.
pub fn list_streams(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut streams = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let id = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok());
        if let Some(id) = id {
            streams.push((id, entry.path().to_path_buf()));
        }
    }
    streams.sort_by_key(|(id, _)| *id);
    Ok(streams)
}

fn read_header_line(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

impl StreamRouter {
    /// Open the router over `dir`, creating it if needed and re-seeding the
    /// key map from existing streams.
    pub fn open(dir: &Path, max_open: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create summary directory: {}", dir.display()))?;

        let mut ids = HashMap::new();
        let mut next_id = 1;
        for (id, path) in list_streams(dir)? {
            next_id = next_id.max(id + 1);
            match read_header_line(&path) {
                Ok(key) if !key.is_empty() => {
                    if let Some(previous) = ids.get(&key) {
                        tracing::warn!(
                            stream = id,
                            kept = previous,
                            "duplicate stream header, ignoring stream"
                        );
                    } else {
                        ids.insert(key, id);
                    }
                }
                Ok(_) => tracing::warn!(stream = id, "stream has an empty header, ignoring it"),
                Err(e) => tracing::warn!(stream = id, error = %e, "unreadable stream header"),
            }
        }
        tracing::debug!(streams = ids.len(), next_id, "stream router seeded");

        Ok(Self {
            dir: dir.to_path_buf(),
            ids,
            next_id,
            handles: HashMap::new(),
            max_open: max_open.max(1),
            clock: 0,
            created: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stream_path(&self, id: u64) -> PathBuf {
        self.dir.join(id.to_string())
    }

    /// Id of the stream for `key`, if one exists.
    pub fn stream_id(&self, key: &str) -> Option<u64> {
        self.ids.get(key).copied()
    }

    /// Number of known streams, seeded ones included.
    pub fn stream_count(&self) -> usize {
        self.ids.len()
    }

    /// Streams created since the router was opened.
    pub fn created_this_run(&self) -> usize {
        self.created
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Append one value line to the stream of `key`, creating the stream on
    /// first sight.
    pub fn append(&mut self, key: &str, value: &str) -> Result<()> {
        self.clock += 1;
        let id = match self.ids.get(key) {
            Some(id) => *id,
            None => self.create_stream(key)?,
        };
        let now = self.clock;
        let stream = self.acquire(id)?;
        stream.last_used = now;
        writeln!(stream.writer, "{}", value)
            .with_context(|| format!("Failed to append to stream {}", id))
    }

    /// Flush every open writer.
    pub fn flush(&mut self) -> Result<()> {
        for (id, stream) in self.handles.iter_mut() {
            stream
                .writer
                .flush()
                .with_context(|| format!("Failed to flush stream {}", id))?;
        }
        Ok(())
    }

    /// Flush and release every writer.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.handles.clear();
        Ok(())
    }

    fn create_stream(&mut self, key: &str) -> Result<u64> {
        let id = self.next_id;
        let path = self.stream_path(id);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Failed to create stream: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let header = key.replace(['\n', '\r'], " ");
        write!(writer, "{}\n\n", header)
            .with_context(|| format!("Failed to write stream header: {}", path.display()))?;

        self.make_room()?;
        self.handles.insert(
            id,
            OpenStream {
                writer,
                last_used: self.clock,
            },
        );
        self.ids.insert(key.to_string(), id);
        self.next_id += 1;
        self.created += 1;
        tracing::debug!(stream = id, key, "created stream");
        Ok(id)
    }

    fn acquire(&mut self, id: u64) -> Result<&mut OpenStream> {
        if !self.handles.contains_key(&id) {
            self.make_room()?;
            let path = self.stream_path(id);
            let file = OpenOptions::new()
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open stream: {}", path.display()))?;
            self.handles.insert(
                id,
                OpenStream {
                    writer: BufWriter::new(file),
                    last_used: self.clock,
                },
            );
        }
        self.handles
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("stream {} missing from arena", id))
    }

    /// Evict least recently used writers until one more fits.
    fn make_room(&mut self) -> Result<()> {
        while self.handles.len() >= self.max_open {
            let lru = self
                .handles
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| *id);
            let Some(id) = lru else { break };
            if let Some(mut stream) = self.handles.remove(&id) {
                stream
                    .writer
                    .flush()
                    .with_context(|| format!("Failed to flush stream {}", id))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(router: &StreamRouter, id: u64) -> String {
        std::fs::read_to_string(router.stream_path(id)).unwrap()
    }

    #[test]
    fn ids_are_assigned_in_first_seen_order() {
        let tmp = TempDir::new().unwrap();
        let mut router = StreamRouter::open(tmp.path(), 8).unwrap();
        router.append("a:x", "1").unwrap();
        router.append("b:y", "red").unwrap();
        router.append("a:x", "2").unwrap();
        router.flush().unwrap();

        assert_eq!(router.stream_id("a:x"), Some(1));
        assert_eq!(router.stream_id("b:y"), Some(2));
        assert_eq!(read(&router, 1), "a:x\n\n1\n2\n");
        assert_eq!(read(&router, 2), "b:y\n\nred\n");
        assert_eq!(router.created_this_run(), 2);
    }

    #[test]
    fn eviction_keeps_per_key_order() {
        let tmp = TempDir::new().unwrap();
        let mut router = StreamRouter::open(tmp.path(), 2).unwrap();
        for i in 0..5 {
            for key in ["k1", "k2", "k3"] {
                router.append(key, &i.to_string()).unwrap();
            }
            assert!(router.open_handles() <= 2);
        }
        router.close().unwrap();

        let content = std::fs::read_to_string(tmp.path().join("3")).unwrap();
        assert_eq!(content, "k3\n\n0\n1\n2\n3\n4\n");
    }

    #[test]
    fn reopening_appends_to_existing_streams() {
        let tmp = TempDir::new().unwrap();
        {
            let mut router = StreamRouter::open(tmp.path(), 4).unwrap();
            router.append("a:x", "1").unwrap();
            router.append("b:y", "2").unwrap();
            router.close().unwrap();
        }
        let mut router = StreamRouter::open(tmp.path(), 4).unwrap();
        assert_eq!(router.stream_count(), 2);
        router.append("a:x", "3").unwrap();
        router.append("c:z", "4").unwrap();
        router.flush().unwrap();

        assert_eq!(read(&router, 1), "a:x\n\n1\n3\n");
        assert_eq!(router.stream_id("c:z"), Some(3));
        assert_eq!(router.created_this_run(), 1);
    }

    #[test]
    fn non_numeric_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("README"), "not a stream").unwrap();
        std::fs::write(tmp.path().join("7"), "q:r\n\n1\n").unwrap();
        let mut router = StreamRouter::open(tmp.path(), 4).unwrap();
        assert_eq!(router.stream_id("q:r"), Some(7));
        router.append("new", "v").unwrap();
        assert_eq!(router.stream_id("new"), Some(8));

        let listed: Vec<u64> = list_streams(tmp.path())
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(listed, vec![7, 8]);
    }
}
