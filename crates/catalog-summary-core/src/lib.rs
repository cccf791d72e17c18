//! # Catalog Summary Core
//!
//! Pure building blocks for the catalog crawl-and-aggregate pipeline. This
//! crate performs no filesystem or network I/O of its own: readers and
//! sinks are injected by the caller.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Samples, file records, aggregated summaries |
//! | [`normalize`] | Identifier normalization of path segments |
//! | [`flatten`] | Recursive attribute flattening with blacklists |
//! | [`aggregate`] | Stream classification, histograms, category collapse |
//! | [`sink`] | Summary sink trait and in-memory implementation |

pub mod aggregate;
pub mod flatten;
pub mod models;
pub mod normalize;
pub mod sink;
