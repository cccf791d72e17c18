//! Identifier normalization for catalog paths.
//!
//! Catalog paths embed sample numbers, delivery batches, run counters and
//! genotyping-array scan identifiers. Replacing those with fixed tokens makes
//! files from unrelated samples and runs collapse onto the same attribute
//! key, which is what allows cross-sample aggregation.
//!
//! Each family is tested against the *start* of the segment and, when it
//! matches, every occurrence inside the segment is substituted. The checks
//! run in a fixed order on the progressively rewritten segment:
//!
//! | Order | Family | Token |
//! |-------|--------|-------|
//! | 1 | LP sample number | `SAMPLE_ID` |
//! | 2 | Delivery batch | `DELIVERY_ID` |
//! | 3 | Pure integer (whole segment) | `EXECUTION` |
//! | 4 | Genotyping red channel | `GENOTYPING_IDAT_RED` |
//! | 5 | Genotyping green channel | `GENOTYPING_IDAT_GREEN` |
//! | 6 | Genotyping call file stem | `GENOTYPING_GTC` |
//! | 7 | Cancer / normal prefixed sample (anywhere) | `NORMAL_SAMPLE_ID` / `CANCER_SAMPLE_ID` |
//!
//! Step 7 always runs, even when step 1 already rewrote the segment. Its
//! tokens are crossed (cancer → `NORMAL_SAMPLE_ID`, normal →
//! `CANCER_SAMPLE_ID`) to match the keys already stored by earlier crawls.

use regex::Regex;
use std::sync::OnceLock;

pub const SAMPLE_TOKEN: &str = "SAMPLE_ID";
pub const CANCER_SAMPLE_TOKEN: &str = "CANCER_SAMPLE_ID";
pub const NORMAL_SAMPLE_TOKEN: &str = "NORMAL_SAMPLE_ID";
pub const DELIVERY_TOKEN: &str = "DELIVERY_ID";
pub const EXECUTION_TOKEN: &str = "EXECUTION";
pub const IDAT_RED_TOKEN: &str = "GENOTYPING_IDAT_RED";
pub const IDAT_GREEN_TOKEN: &str = "GENOTYPING_IDAT_GREEN";
pub const GTC_TOKEN: &str = "GENOTYPING_GTC";

/// Separator used when splitting raw catalog paths.
pub const PATH_SEPARATOR: char = '/';
/// Separator used when re-joining normalized segments.
pub const SEGMENT_JOIN: &str = ";";

const SAMPLE_RE: &str = r"LP\d{7}-DNA_[A-H](0[1-9]|1[0-2])";
const CANCER_SAMPLE_RE: &str = r"CancerLP\d{7}-DNA_[A-H](0[1-9]|1[0-2])";
const NORMAL_SAMPLE_RE: &str = r"NormalLP\d{7}-DNA_[A-H](0[1-9]|1[0-2])";
const DELIVERY_RE: &str = r"^((?:RAREP|RARET|CANCP|CANCT)[0-9]{5}|(?:HX|CF|CH|OX|VD|BE|ED)[0-9]{8}|V_V[0-9]{11}|[0-9]{10})$";
const IDAT_RED_RE: &str = r"[0-9]{12}_[A-z a-z][0-9]{2}[A-z a-z][0-9]{2}_RED";
const IDAT_GREEN_RE: &str = r"[0-9]{12}_[A-z a-z][0-9]{2}[A-z a-z][0-9]{2}_GRN";
const GTC_RE: &str = r"[0-9]{12}_[A-z a-z][0-9]{2}[A-z a-z][0-9]{2}";

/// A family pattern: `leading` decides whether the family applies, `any`
/// performs the substitution.
struct Family {
    leading: Regex,
    any: Regex,
    token: &'static str,
}

impl Family {
    fn new(pattern: &str, token: &'static str) -> Self {
        Self {
            leading: Regex::new(&format!("^(?:{})", pattern)).expect("valid identifier regex"),
            any: Regex::new(pattern).expect("valid identifier regex"),
            token,
        }
    }

    fn applies(&self, segment: &str) -> bool {
        self.leading.is_match(segment)
    }

    fn substitute(&self, segment: &str) -> String {
        self.any.replace_all(segment, self.token).into_owned()
    }
}

struct Families {
    sample: Family,
    delivery: Family,
    idat_red: Family,
    idat_green: Family,
    gtc: Family,
    cancer_sample: Family,
    normal_sample: Family,
}

static FAMILIES: OnceLock<Families> = OnceLock::new();

fn families() -> &'static Families {
    FAMILIES.get_or_init(|| Families {
        sample: Family::new(SAMPLE_RE, SAMPLE_TOKEN),
        delivery: Family::new(DELIVERY_RE, DELIVERY_TOKEN),
        idat_red: Family::new(IDAT_RED_RE, IDAT_RED_TOKEN),
        idat_green: Family::new(IDAT_GREEN_RE, IDAT_GREEN_TOKEN),
        gtc: Family::new(GTC_RE, GTC_TOKEN),
        cancer_sample: Family::new(CANCER_SAMPLE_RE, NORMAL_SAMPLE_TOKEN),
        normal_sample: Family::new(NORMAL_SAMPLE_RE, CANCER_SAMPLE_TOKEN),
    })
}

/// Signed decimal integer, surrounding whitespace allowed.
fn is_integer(segment: &str) -> bool {
    let trimmed = segment.trim();
    let digits = trimmed
        .strip_prefix(|c: char| c == '+' || c == '-')
        .unwrap_or(trimmed);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Normalize a single path segment or attribute name.
///
/// Non-matching input is returned unchanged.
pub fn normalize_segment(segment: &str) -> String {
    let f = families();
    let mut current = segment.to_string();

    if f.sample.applies(&current) {
        current = f.sample.substitute(&current);
    }
    if f.delivery.applies(&current) {
        current = f.delivery.substitute(&current);
    }
    if is_integer(&current) {
        return EXECUTION_TOKEN.to_string();
    }
    if f.idat_red.applies(&current) {
        current = f.idat_red.substitute(&current);
    }
    if f.idat_green.applies(&current) {
        current = f.idat_green.substitute(&current);
    }
    if f.gtc.applies(&current) {
        current = f.gtc.substitute(&current);
    }
    current = f.cancer_sample.substitute(&current);
    f.normal_sample.substitute(&current)
}

/// Split `path` on `/`, normalize each segment and re-join with `;`.
///
/// A leading `/` yields an empty first segment, so absolute paths keep a
/// leading `;`.
pub fn transform_path(path: &str) -> String {
    path.split(PATH_SEPARATOR)
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join(SEGMENT_JOIN)
}
