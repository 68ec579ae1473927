//! Catalog-Harvest: a resumable catalog crawler
//!
//! This crate crawls a hierarchical catalog (main category → sub-category →
//! item URLs), extracts structured fields from each item page and persists
//! them as sharded JSON files. A durable ledger records every resolved URL so
//! that repeated runs converge instead of redoing work.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod ledger;
pub mod output;
pub mod shard;
pub mod state;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Shard store error: {0}")]
    Shard(#[from] shard::ShardError),

    #[error("Planning error: {0}")]
    Planning(#[from] catalog::PlanningError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector for {field}: {selector}")]
    InvalidSelector { field: String, selector: String },
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{CatalogEntry, Pair};
pub use config::Config;
pub use state::{LedgerStatus, Resolution};
