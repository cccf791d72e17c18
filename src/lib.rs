//! # Catalog Summary
//!
//! Crawl a sample/file metadata catalog and summarize every attribute into
//! plot-ready distributions.
//!
//! The pipeline has two phases. The crawl walks every sample in a catalog,
//! flattens each file's metadata into `key → value` leaves and appends the
//! values to one stream file per attribute key. The aggregation reads every
//! stream, decides whether it is numeric or categorical and persists a
//! histogram or top-N distribution per attribute.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │   Catalog    │──▶│  Flatten  │──▶│  Streams  │──▶│Aggregate │
//! │ JSON/OpenCGA │   │ normalize │   │ 1 per key │   │ → SQLite │
//! └──────────────┘   └───────────┘   └───────────┘   └──────────┘
//!         ▲                               │
//!         └──────── resume ledger ◀───────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catsum init                   # create database
//! catsum crawl                  # flatten catalog into streams
//! catsum aggregate              # summarize streams into SQLite
//! catsum stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`catalog`] | Catalog abstraction and backends |
//! | [`ledger`] | Append-only record of crawled samples |
//! | [`router`] | Attribute key to stream file routing |
//! | [`crawler`] | Crawl loop over a catalog |
//! | [`aggregator`] | Parallel aggregation of stream files |
//! | [`sqlite_sink`] | SQLite persistence of summaries |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! Pure pipeline logic (identifier normalization, flattening and
//! distributions) lives in the `catalog_summary_core` crate.

pub mod aggregator;
pub mod catalog;
pub mod catalog_json;
pub mod catalog_opencga;
pub mod config;
pub mod crawler;
pub mod db;
pub mod ledger;
pub mod migrate;
pub mod progress;
pub mod router;
pub mod sqlite_sink;
pub mod stats;
