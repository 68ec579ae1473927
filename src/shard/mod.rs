//! Shard module: sharded JSON output
//!
//! Extracted records are written per pair into a sequence of bounded JSON
//! files ("shards"). Shards are append-only: a record is never rewritten or
//! removed once it is in a shard, and a closed shard is never reopened.
//!
//! # Components
//!
//! - `ShardLayout`: deterministic shard paths derived from category names
//! - `ExtractedRecord`: one output record, always carrying a `url`
//! - `ShardStore`: per-pair append with duplicate suppression

mod naming;
mod record;
mod store;

pub use naming::{sanitize_component, ShardLayout};
pub use record::{CourseRecord, ExtractedRecord, ShardFile};
pub use store::{Appended, ShardStore};

use thiserror::Error;

/// Errors that can occur during shard operations
#[derive(Debug, Error)]
pub enum ShardError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed shard file {path}: {source}")]
    Malformed {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record has no url field")]
    MissingUrl,

    #[error("Shard lock poisoned for {0}")]
    LockPoisoned(String),
}

/// Result type for shard operations
pub type ShardResult<T> = Result<T, ShardError>;
