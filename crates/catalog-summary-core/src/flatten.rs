//! Recursive flattening of file attribute trees into scalar leaves.
//!
//! A file record is a JSON object whose values may be scalars, nested
//! objects or arrays, nested to any depth. Flattening walks the tree and
//! emits one `(key, value)` pair per scalar:
//!
//! - object entries extend the key with `:<normalized name>`, where a `/`
//!   inside the name splits it like a path segment;
//! - array elements reuse the key of the array itself, so every element of a
//!   list attribute lands in the same stream;
//! - attributes whose name is blacklisted are skipped together with their
//!   whole subtree.
//!
//! The key starts with the file's path passed through
//! [`transform_path`](crate::normalize::transform_path).

use std::collections::HashSet;

use anyhow::Result;
use serde_json::Value;

use crate::models::{FileRecord, KEY_SEPARATOR};
use crate::normalize::transform_path;

pub const DEFAULT_BLACKLISTED_ATTRIBUTES: &[&str] = &["path", "uri"];
pub const DEFAULT_BLACKLISTED_FILE_ENDINGS: &[&str] = &["log"];

/// Blacklists applied while flattening.
#[derive(Debug, Clone)]
pub struct FlattenOptions {
    pub blacklisted_attributes: HashSet<String>,
    pub blacklisted_file_endings: Vec<String>,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self::new(
            DEFAULT_BLACKLISTED_ATTRIBUTES.iter().copied(),
            DEFAULT_BLACKLISTED_FILE_ENDINGS.iter().copied(),
        )
    }
}

impl FlattenOptions {
    pub fn new<A, E>(attributes: A, file_endings: E) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            blacklisted_attributes: attributes.into_iter().map(Into::into).collect(),
            blacklisted_file_endings: file_endings.into_iter().map(Into::into).collect(),
        }
    }

    /// True when `path` ends with any blacklisted suffix. Suffixes are plain
    /// string endings, not extensions: `log` also matches `catalog`.
    pub fn is_blacklisted_file(&self, path: &str) -> bool {
        self.blacklisted_file_endings
            .iter()
            .any(|ending| path.ends_with(ending.as_str()))
    }

    pub fn is_blacklisted_attribute(&self, name: &str) -> bool {
        self.blacklisted_attributes.contains(name)
    }
}

/// A single flattened scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub key: String,
    pub value: String,
}

/// Extend an attribute key with one more attribute name.
pub fn attribute_key(base: &str, name: &str) -> String {
    let mut key = String::with_capacity(base.len() + name.len() + 1);
    key.push_str(base);
    key.push(KEY_SEPARATOR);
    key.push_str(&transform_path(name));
    key
}

/// Text form of a scalar as written to an accumulation stream.
///
/// Streams are line oriented, so embedded line breaks are folded into
/// spaces.
pub fn render_scalar(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    if text.contains(['\n', '\r']) {
        text.replace(['\n', '\r'], " ")
    } else {
        text
    }
}

/// Flatten `record`, calling `emit(key, value)` for every scalar leaf.
///
/// Returns the number of leaves emitted. The first error returned by `emit`
/// stops the walk and is propagated.
pub fn flatten_record<F>(record: &FileRecord, options: &FlattenOptions, mut emit: F) -> Result<usize>
where
    F: FnMut(&str, &str) -> Result<()>,
{
    let base = transform_path(&record.path);
    let mut emitted = 0;
    for (name, value) in &record.attributes {
        let key = attribute_key(&base, name);
        emitted += visit(name, value, &key, options, &mut emit)?;
    }
    Ok(emitted)
}

fn visit<F>(
    name: &str,
    value: &Value,
    key: &str,
    options: &FlattenOptions,
    emit: &mut F,
) -> Result<usize>
where
    F: FnMut(&str, &str) -> Result<()>,
{
    if options.is_blacklisted_attribute(name) {
        return Ok(0);
    }
    match value {
        Value::Object(map) => {
            let mut emitted = 0;
            for (child, child_value) in map {
                let child_key = attribute_key(key, child);
                emitted += visit(child, child_value, &child_key, options, emit)?;
            }
            Ok(emitted)
        }
        Value::Array(items) => {
            let mut emitted = 0;
            for item in items {
                emitted += visit(name, item, key, options, emit)?;
            }
            Ok(emitted)
        }
        scalar => {
            emit(key, &render_scalar(scalar))?;
            Ok(1)
        }
    }
}

/// Collect all leaves of `record` in walk order.
pub fn leaves(record: &FileRecord, options: &FlattenOptions) -> Vec<Leaf> {
    let mut out = Vec::new();
    // The collector never fails.
    let _ = flatten_record(record, options, |key, value| {
        out.push(Leaf {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FileRecord {
        FileRecord::try_from(value).unwrap()
    }

    fn pairs(leaves: &[Leaf]) -> Vec<(&str, &str)> {
        leaves
            .iter()
            .map(|l| (l.key.as_str(), l.value.as_str()))
            .collect()
    }

    #[test]
    fn nested_objects_and_list_fan_in() {
        let rec = record(json!({
            "path": "/x/y.txt",
            "qc": {"pass": true},
            "tags": ["a", "b"]
        }));
        let out = leaves(&rec, &FlattenOptions::default());
        assert_eq!(
            pairs(&out),
            vec![
                (";x;y.txt:qc:pass", "true"),
                (";x;y.txt:tags", "a"),
                (";x;y.txt:tags", "b"),
            ]
        );
    }

    #[test]
    fn path_identifiers_are_normalized_in_keys() {
        let rec = record(json!({
            "path": "/genomes/RAREP12345/LP1234567-DNA_A01/3/stats.json",
            "size": 1024
        }));
        let out = leaves(&rec, &FlattenOptions::default());
        assert_eq!(
            pairs(&out),
            vec![(";genomes;DELIVERY_ID;SAMPLE_ID;EXECUTION;stats.json:size", "1024")]
        );
    }

    #[test]
    fn attribute_names_are_normalized() {
        let rec = record(json!({
            "path": "a.txt",
            "per_sample": {"LP1234567-DNA_A01": {"depth": 31.5}}
        }));
        let out = leaves(&rec, &FlattenOptions::default());
        assert_eq!(pairs(&out), vec![("a.txt:per_sample:SAMPLE_ID:depth", "31.5")]);
    }

    #[test]
    fn slashes_in_attribute_names_split_like_paths() {
        let rec = record(json!({
            "path": "a.txt",
            "stats": {"LP1234567-DNA_A01/7/reads": 12}
        }));
        let out = leaves(&rec, &FlattenOptions::default());
        assert_eq!(
            pairs(&out),
            vec![("a.txt:stats:SAMPLE_ID;EXECUTION;reads", "12")]
        );
    }

    #[test]
    fn list_of_objects_shares_keys() {
        let rec = record(json!({
            "path": "r.json",
            "runs": [{"lane": 1}, {"lane": 2, "ok": false}]
        }));
        let out = leaves(&rec, &FlattenOptions::default());
        assert_eq!(
            pairs(&out),
            vec![
                ("r.json:runs:lane", "1"),
                ("r.json:runs:lane", "2"),
                ("r.json:runs:ok", "false"),
            ]
        );
    }

    #[test]
    fn nested_lists_fan_in_to_the_same_key() {
        let rec = record(json!({"path": "m", "matrix": [[1, 2], [3]]}));
        let out = leaves(&rec, &FlattenOptions::default());
        assert_eq!(
            pairs(&out),
            vec![("m:matrix", "1"), ("m:matrix", "2"), ("m:matrix", "3")]
        );
    }

    #[test]
    fn uri_is_skipped_at_any_depth() {
        let rec = record(json!({
            "path": "/p/q.bam",
            "uri": "file:///p/q.bam",
            "meta": {
                "uri": "file:///elsewhere",
                "deep": {"uri": {"inner": 1}, "keep": "yes"},
                "links": [{"uri": "x"}, {"uri": "y"}]
            }
        }));
        let out = leaves(&rec, &FlattenOptions::default());
        assert!(out.iter().all(|l| !l.key.contains("uri")), "{:?}", out);
        assert_eq!(pairs(&out), vec![(";p;q.bam:meta:deep:keep", "yes")]);
    }

    #[test]
    fn custom_blacklist() {
        let rec = record(json!({"path": "f", "secret": 1, "public": 2}));
        let options = FlattenOptions::new(["secret"], Vec::<String>::new());
        let out = leaves(&rec, &options);
        // `path` is no longer blacklisted.
        assert_eq!(pairs(&out), vec![("f:path", "f"), ("f:public", "2")]);
    }

    #[test]
    fn file_endings_are_plain_suffixes() {
        let options = FlattenOptions::default();
        assert!(options.is_blacklisted_file("/a/run.log"));
        assert!(options.is_blacklisted_file("/a/catalog"));
        assert!(!options.is_blacklisted_file("/a/run.log.gz"));
    }

    #[test]
    fn scalars_render_as_text() {
        assert_eq!(render_scalar(&json!("abc")), "abc");
        assert_eq!(render_scalar(&json!(3)), "3");
        assert_eq!(render_scalar(&json!(2.5)), "2.5");
        assert_eq!(render_scalar(&json!(true)), "true");
        assert_eq!(render_scalar(&Value::Null), "null");
        assert_eq!(render_scalar(&json!("two\nlines")), "two lines");
    }

    #[test]
    fn emit_errors_stop_the_walk() {
        let rec = record(json!({"path": "f", "a": 1, "b": 2}));
        let mut calls = 0;
        let result = flatten_record(&rec, &FlattenOptions::default(), |_, _| {
            calls += 1;
            anyhow::bail!("disk full")
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
