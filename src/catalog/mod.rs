//! Catalog module: the crawl input
//!
//! The catalog is produced by an external discovery step as one JSON file
//! per `(main_category, sub_category)` pair. This module defines the
//! in-memory shape of that catalog and loads it from disk.
//!
//! # Components
//!
//! - `Pair`: a `(main_category, sub_category)` grouping
//! - `CatalogEntry`: one item URL listed under a pair
//! - `load_catalog`: walks a catalog directory and flattens it into entries

mod loader;

pub use loader::{load_catalog, parse_catalog_file, CatalogFile, CatalogLoad, CourseLink};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A `(main_category, sub_category)` grouping of catalog URLs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub main_category: String,
    pub sub_category: String,
}

impl Pair {
    /// Creates a new pair from its two category names
    pub fn new(main_category: impl Into<String>, sub_category: impl Into<String>) -> Self {
        Self {
            main_category: main_category.into(),
            sub_category: sub_category.into(),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.main_category, self.sub_category)
    }
}

/// A single item URL listed under a pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// The pair this entry was listed under
    pub pair: Pair,

    /// Absolute item URL
    pub url: String,

    /// Title as listed in the catalog (informational only)
    pub title: Option<String>,
}

impl CatalogEntry {
    pub fn new(pair: Pair, url: impl Into<String>) -> Self {
        Self {
            pair,
            url: url.into(),
            title: None,
        }
    }
}

/// A catalog problem that causes an entry or file to be skipped
///
/// Catalog problems are never fatal to a run: the offending entry is
/// reported and left out of the plan. Only an invalid batch size or an
/// unreachable ledger stops planning.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Failed to read catalog file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed catalog file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Catalog file {path} is missing {field}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Invalid URL '{url}' in {path}: {reason}")]
    InvalidUrl {
        path: PathBuf,
        url: String,
        reason: String,
    },

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Ledger unavailable while planning: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),
}

/// Result type for planning operations
pub type PlanResult<T> = Result<T, PlanningError>;
