//! Statistical aggregation of accumulation streams.
//!
//! A stream is a text file: the attribute key on line one, a blank line,
//! then one value per line. Aggregation makes two passes over it:
//!
//! 1. **Classify**: the stream is numeric only if *every* value line parses
//!    as a finite float. A single bad line demotes it to categorical.
//! 2. **Summarize**:
//!    - numeric streams are binned into `intervals` equal-width buckets
//!      between the minimum and maximum;
//!    - categorical streams are counted per distinct value and the long tail
//!      beyond `max_categories - 1` entries is folded into a `Rest` bucket.
//!
//! Outlier exclusion is an injectable [`OutlierDetector`]; the default
//! [`NoOutliers`] excludes nothing.

use std::collections::HashMap;
use std::io::BufRead;

use anyhow::{Context, Result};

use crate::models::{AggregatedSummary, Distribution};

pub const DEFAULT_INTERVALS: usize = 200;
pub const DEFAULT_MAX_CATEGORIES: usize = 20;
pub const REST_LABEL: &str = "Rest";

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Number of histogram buckets for numeric streams.
    pub intervals: usize,
    /// Maximum number of entries in a categorical distribution, `Rest`
    /// included.
    pub max_categories: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS,
            max_categories: DEFAULT_MAX_CATEGORIES,
        }
    }
}

/// Strategy deciding which numeric values are excluded as outliers.
pub trait OutlierDetector: Send + Sync {
    /// Return the values to exclude. `min` and `max` come from the first
    /// scan of the stream.
    fn detect(&self, values: &[f64], min: f64, max: f64) -> Vec<f64>;
}

/// Excludes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutliers;

impl OutlierDetector for NoOutliers {
    fn detect(&self, _values: &[f64], _min: f64, _max: f64) -> Vec<f64> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Numeric,
    Categorical,
}

/// Parse one value line as a finite float.
///
/// `nan` and infinities are rejected: they have no place on a histogram
/// axis, so such streams are summarized as categorical.
pub fn parse_numeric(line: &str) -> Option<f64> {
    line.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Running minimum and maximum.
#[derive(Debug, Clone, Copy, Default)]
struct Range {
    bounds: Option<(f64, f64)>,
}

impl Range {
    fn observe(&mut self, value: f64) {
        self.bounds = Some(match self.bounds {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });
    }
}

fn strip_newline(line: &mut String) {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
}

/// Read the header (attribute key and blank separator line).
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut name = String::new();
    reader
        .read_line(&mut name)
        .context("Failed to read stream header")?;
    strip_newline(&mut name);
    let mut blank = String::new();
    reader
        .read_line(&mut blank)
        .context("Failed to read stream header separator")?;
    Ok(name)
}

fn for_each_value<R, F>(reader: R, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str) -> bool,
{
    for line in reader.lines() {
        let line = line.context("Failed to read stream value")?;
        let value = line.strip_suffix('\r').unwrap_or(&line);
        if !f(value) {
            break;
        }
    }
    Ok(())
}

/// Classify a stream positioned at its start. Stops at the first
/// non-numeric line. Streams without values are categorical.
pub fn classify_stream<R: BufRead>(mut reader: R) -> Result<StreamKind> {
    read_header(&mut reader)?;
    let mut seen_any = false;
    let mut all_numeric = true;
    for_each_value(reader, |line| {
        seen_any = true;
        all_numeric = parse_numeric(line).is_some();
        all_numeric
    })?;
    Ok(if seen_any && all_numeric {
        StreamKind::Numeric
    } else {
        StreamKind::Categorical
    })
}

/// Classify already-split value lines.
pub fn classify<I, S>(lines: I) -> StreamKind
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen_any = false;
    for line in lines {
        seen_any = true;
        if parse_numeric(line.as_ref()).is_none() {
            return StreamKind::Categorical;
        }
    }
    if seen_any {
        StreamKind::Numeric
    } else {
        StreamKind::Categorical
    }
}

/// Sort a frequency table by count (descending, ties by label) and fold
/// everything past `max_categories - 1` entries into a `Rest` entry.
pub fn collapse_categories(counts: HashMap<String, u64>, max_categories: usize) -> Vec<(String, u64)> {
    let mut sorted: Vec<(String, u64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let keep = max_categories.saturating_sub(1);
    if sorted.len() <= keep {
        return sorted;
    }
    let rest: u64 = sorted[keep..].iter().map(|(_, n)| n).sum();
    sorted.truncate(keep);
    sorted.push((REST_LABEL.to_string(), rest));
    sorted
}

/// Count `values` into `intervals` equal-width buckets over `[min, max]`.
///
/// Boundaries are accumulated step by step from `min`. Each value goes into
/// the first bucket `i` with `boundary[i] <= value <= boundary[i + 1]`;
/// values no bucket claims (rounding at the top edge, or values outside the
/// range) land in the last bucket.
pub fn distribute_in_intervals(min: f64, max: f64, intervals: usize, values: &[f64]) -> Vec<u64> {
    let mut counts = vec![0u64; intervals];
    if intervals == 0 {
        return counts;
    }
    let width = (max - min) / intervals as f64;
    let mut boundaries = Vec::with_capacity(intervals + 1);
    boundaries.push(min);
    for i in 0..intervals {
        boundaries.push(boundaries[i] + width);
    }

    for &value in values {
        let bucket = boundaries
            .windows(2)
            .position(|w| w[0] <= value && value <= w[1])
            .unwrap_or(intervals - 1);
        counts[bucket] += 1;
    }
    counts
}

/// Min and max over `values` not contained in `outliers`.
pub fn range_excluding(values: &[f64], outliers: &[f64]) -> Option<(f64, f64)> {
    let mut range = Range::default();
    for &value in values {
        if !outliers.contains(&value) {
            range.observe(value);
        }
    }
    range.bounds
}

/// Summarize a categorical stream positioned at its start.
pub fn aggregate_categorical<R: BufRead>(
    mut reader: R,
    options: &AggregateOptions,
) -> Result<AggregatedSummary> {
    let name = read_header(&mut reader)?;
    let mut counts: HashMap<String, u64> = HashMap::new();
    for_each_value(reader, |line| {
        if !line.is_empty() {
            *counts.entry(line.to_string()).or_insert(0) += 1;
        }
        true
    })?;

    Ok(AggregatedSummary {
        name,
        is_numeric: false,
        min: 0.0,
        max: 0.0,
        outliers: Vec::new(),
        distribution: Distribution::Categories(collapse_categories(
            counts,
            options.max_categories,
        )),
    })
}

/// Summarize a numeric stream positioned at its start.
///
/// Fails if a value line does not parse; call [`classify_stream`] first.
pub fn aggregate_numeric<R: BufRead>(
    mut reader: R,
    options: &AggregateOptions,
    detector: &dyn OutlierDetector,
) -> Result<AggregatedSummary> {
    let name = read_header(&mut reader)?;
    let mut values = Vec::new();
    let mut scanned = Range::default();
    let mut bad_line: Option<String> = None;
    for_each_value(reader, |line| match parse_numeric(line) {
        Some(v) => {
            scanned.observe(v);
            values.push(v);
            true
        }
        None => {
            bad_line = Some(line.to_string());
            false
        }
    })?;
    if let Some(line) = bad_line {
        anyhow::bail!("Non-numeric value '{}' in numeric stream '{}'", line, name);
    }
    let (scan_min, scan_max) = scanned
        .bounds
        .ok_or_else(|| anyhow::anyhow!("Numeric stream '{}' has no values", name))?;

    let outliers = detector.detect(&values, scan_min, scan_max);
    let (min, max) = range_excluding(&values, &outliers).unwrap_or((scan_min, scan_max));
    let kept: Vec<f64> = if outliers.is_empty() {
        values
    } else {
        values
            .into_iter()
            .filter(|v| !outliers.contains(v))
            .collect()
    };

    Ok(AggregatedSummary {
        name,
        is_numeric: true,
        min,
        max,
        outliers,
        distribution: Distribution::Histogram(distribute_in_intervals(
            min,
            max,
            options.intervals,
            &kept,
        )),
    })
}

/// Classify and summarize one stream.
///
/// `open` is called once per pass and must return a reader positioned at
/// the start of the stream.
pub fn aggregate_stream<R, F>(
    mut open: F,
    options: &AggregateOptions,
    detector: &dyn OutlierDetector,
) -> Result<AggregatedSummary>
where
    R: BufRead,
    F: FnMut() -> Result<R>,
{
    match classify_stream(open()?)? {
        StreamKind::Numeric => aggregate_numeric(open()?, options, detector),
        StreamKind::Categorical => aggregate_categorical(open()?, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(name: &str, values: &[&str]) -> String {
        let mut s = format!("{}\n\n", name);
        for v in values {
            s.push_str(v);
            s.push('\n');
        }
        s
    }

    fn run(text: &str) -> AggregatedSummary {
        aggregate_stream(
            || Ok(Cursor::new(text.as_bytes())),
            &AggregateOptions::default(),
            &NoOutliers,
        )
        .unwrap()
    }

    #[test]
    fn classification_is_all_or_nothing() {
        assert_eq!(classify(["1", "2.5", "-3e2"]), StreamKind::Numeric);
        assert_eq!(classify(["1", "x", "3"]), StreamKind::Categorical);
        assert_eq!(classify(["1", ""]), StreamKind::Categorical);
        assert_eq!(classify(Vec::<&str>::new()), StreamKind::Categorical);
        assert_eq!(classify([" 4 "]), StreamKind::Numeric);
        assert_eq!(classify(["nan"]), StreamKind::Categorical);
        assert_eq!(classify(["inf"]), StreamKind::Categorical);
        assert_eq!(classify(["1", "1e400"]), StreamKind::Categorical);
    }

    #[test]
    fn header_lines_are_not_values() {
        // A numeric-looking header must not matter, nor a non-numeric one.
        let text = stream("a;b:c", &["1", "2"]);
        let kind = classify_stream(Cursor::new(text.as_bytes())).unwrap();
        assert_eq!(kind, StreamKind::Numeric);
    }

    #[test]
    fn one_bad_line_demotes_to_categorical() {
        let summary = run(&stream("k", &["1", "2", "oops", "2"]));
        assert!(!summary.is_numeric);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 0.0);
        assert_eq!(
            summary.distribution,
            Distribution::Categories(vec![
                ("2".to_string(), 2),
                ("1".to_string(), 1),
                ("oops".to_string(), 1),
            ])
        );
    }

    #[test]
    fn categorical_skips_empty_lines_and_reads_name() {
        let summary = run(&stream(";x;y.txt:qc:status", &["PASS", "", "FAIL", "PASS"]));
        assert_eq!(summary.name, ";x;y.txt:qc:status");
        assert_eq!(summary.file_path(), ";x;y.txt");
        assert_eq!(
            summary.distribution,
            Distribution::Categories(vec![("PASS".to_string(), 2), ("FAIL".to_string(), 1)])
        );
    }

    #[test]
    fn long_tail_collapses_into_rest() {
        // 21 distinct labels: a..u with descending counts 25, 20, 18, ... 1, 1
        let labels: Vec<String> = (b'a'..=b'u').map(|c| (c as char).to_string()).collect();
        let mut counts = HashMap::new();
        let mut expected_rest = 0;
        for (i, label) in labels.iter().enumerate() {
            let n = match i {
                0 => 25,
                1 => 20,
                2 => 18,
                19 | 20 => 1,
                _ => 20 - i as u64 - 1,
            };
            if i >= 19 {
                expected_rest += n;
            }
            counts.insert(label.clone(), n);
        }
        let out = collapse_categories(counts, DEFAULT_MAX_CATEGORIES);
        assert_eq!(out.len(), 20);
        assert_eq!(out[0], ("a".to_string(), 25));
        assert_eq!(out[1], ("b".to_string(), 20));
        assert_eq!(out[19], ("Rest".to_string(), expected_rest));
        assert_eq!(expected_rest, 2);
    }

    #[test]
    fn exactly_nineteen_categories_are_kept_as_is() {
        let counts: HashMap<String, u64> = (0..19).map(|i| (format!("v{i:02}"), 1)).collect();
        let out = collapse_categories(counts, DEFAULT_MAX_CATEGORIES);
        assert_eq!(out.len(), 19);
        assert!(out.iter().all(|(label, _)| label != REST_LABEL));
    }

    #[test]
    fn twenty_categories_fold_the_last_one() {
        let counts: HashMap<String, u64> = (0..20).map(|i| (format!("v{i:02}"), 1)).collect();
        let out = collapse_categories(counts, DEFAULT_MAX_CATEGORIES);
        assert_eq!(out.len(), 20);
        assert_eq!(out[19], (REST_LABEL.to_string(), 1));
    }

    #[test]
    fn binning_edges() {
        let counts = distribute_in_intervals(0.0, 100.0, 200, &[0.0, 50.0, 100.0]);
        assert_eq!(counts.len(), 200);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[199], 1);
        // 50 sits on the boundary between buckets 99 and 100; the first
        // bucket that claims it wins.
        assert_eq!(counts[99], 1);
        assert_eq!(counts.iter().sum::<u64>(), 3);
    }

    #[test]
    fn rounding_at_the_top_falls_into_last_bucket() {
        // 0.1 steps accumulate rounding error, the top edge may end up
        // below the max.
        let counts = distribute_in_intervals(0.0, 0.3, 3, &[0.3]);
        assert_eq!(counts, vec![0, 0, 1]);
    }

    #[test]
    fn constant_stream_uses_first_bucket() {
        let counts = distribute_in_intervals(7.0, 7.0, 200, &[7.0, 7.0]);
        assert_eq!(counts[0], 2);
        assert_eq!(counts.iter().sum::<u64>(), 2);
    }

    #[test]
    fn numeric_summary() {
        let summary = run(&stream("f:size", &["10", "30", "20", "40"]));
        assert!(summary.is_numeric);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 40.0);
        assert!(summary.outliers.is_empty());
        match summary.distribution {
            Distribution::Histogram(counts) => {
                assert_eq!(counts.len(), DEFAULT_INTERVALS);
                assert_eq!(counts.iter().sum::<u64>(), 4);
                assert_eq!(counts[0], 1);
                assert_eq!(counts[199], 1);
            }
            other => panic!("expected histogram, got {:?}", other),
        }
    }

    #[test]
    fn empty_stream_is_an_empty_category_summary() {
        let summary = run(&stream("f:nothing", &[]));
        assert!(!summary.is_numeric);
        assert!(summary.distribution.is_empty());
    }

    struct DropAbove(f64);

    impl OutlierDetector for DropAbove {
        fn detect(&self, values: &[f64], _min: f64, _max: f64) -> Vec<f64> {
            values.iter().copied().filter(|v| *v > self.0).collect()
        }
    }

    #[test]
    fn outliers_are_excluded_from_range_and_histogram() {
        let text = stream("f:x", &["1", "2", "3", "1000"]);
        let summary = aggregate_stream(
            || Ok(Cursor::new(text.as_bytes())),
            &AggregateOptions {
                intervals: 2,
                max_categories: 20,
            },
            &DropAbove(100.0),
        )
        .unwrap();
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);
        assert_eq!(summary.outliers, vec![1000.0]);
        assert_eq!(summary.distribution, Distribution::Histogram(vec![2, 1]));
    }

    #[test]
    fn numeric_pass_rejects_bad_lines() {
        let text = stream("f:x", &["1", "zz"]);
        let err = aggregate_numeric(
            Cursor::new(text.as_bytes()),
            &AggregateOptions::default(),
            &NoOutliers,
        )
        .unwrap_err();
        assert!(err.to_string().contains("zz"));
    }

    #[test]
    fn crlf_lines_are_tolerated() {
        let summary = run("k\r\n\r\n1\r\n2\r\n");
        assert_eq!(summary.name, "k");
        assert!(summary.is_numeric);
        assert_eq!(summary.max, 2.0);
    }
}
