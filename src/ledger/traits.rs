//! Ledger trait and error types

use crate::catalog::Pair;
use crate::ledger::{CrossReference, LedgerRecord};
use crate::state::{LedgerStatus, Resolution};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during ledger operations
///
/// Every ledger error is run-fatal: the remaining guarantees depend on the
/// ledger being durable.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Ledger lock poisoned")]
    LockPoisoned,

    #[error("Unknown resolution '{0}' in ledger")]
    UnknownResolution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// What a `record_resolved` call changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// The URL was new; the pair now owns it
    Owner,

    /// The URL is owned elsewhere; a cross-reference for the pair was added
    CrossReference,

    /// Nothing changed; the URL was already recorded for the pair
    AlreadyPresent,

    /// Nothing changed; a failure under a pair that does not own the URL
    /// leaves that pair to be cross-referenced on a later run
    Unresolved,
}

/// Trait for ledger backends
///
/// Implementations serialize all writes internally so the ledger can be
/// shared as `Arc<dyn Ledger>` between concurrently running tasks. Every
/// successful write must be durable before the call returns.
pub trait Ledger: Send + Sync {
    /// Looks up what is known about `url` relative to `pair`
    fn status(&self, url: &str, pair: &Pair) -> LedgerResult<LedgerStatus>;

    /// Records that `url` was resolved under `pair`
    ///
    /// Idempotent. The first pair to record a URL owns it; recording under
    /// a different pair adds a cross-reference instead, unless the
    /// resolution is `Failed`.
    fn record_resolved(
        &self,
        url: &str,
        pair: &Pair,
        resolution: Resolution,
        error_message: Option<&str>,
    ) -> LedgerResult<Recorded>;

    /// Returns the pair that owns `url`, if any
    fn owner_of(&self, url: &str) -> LedgerResult<Option<Pair>>;

    /// All URLs resolved for `pair`, owned or cross-referenced
    fn urls_for_pair(&self, pair: &Pair) -> LedgerResult<HashSet<String>>;

    /// Owner rows in the order they were first recorded
    fn records(&self) -> LedgerResult<Vec<LedgerRecord>>;

    /// Cross-reference rows in the order they were recorded
    fn cross_references(&self) -> LedgerResult<Vec<CrossReference>>;

    /// Number of owner rows
    fn count(&self) -> LedgerResult<u64>;

    /// Number of owner rows per resolution
    fn count_by_resolution(&self) -> LedgerResult<HashMap<Resolution, u64>>;

    /// Number of owner rows per pair, sorted by pair
    fn count_by_pair(&self) -> LedgerResult<Vec<(Pair, u64)>>;

    /// Records the start of a harvest run made with `config_hash`
    ///
    /// Returns the config hash of the previous run, if there was one.
    fn start_run(&self, config_hash: &str) -> LedgerResult<Option<String>>;
}
