//! Ledger module: the durable record of resolved URLs
//!
//! The ledger is the single source of truth for "already done". Every URL is
//! owned by exactly one pair, the first one it was resolved under. Later
//! appearances under other pairs are stored as cross-references and never
//! change that ownership.
//!
//! This module handles:
//! - The `Ledger` trait used by the planner, executor and coordinator
//! - A SQLite-backed implementation that persists every write immediately
//! - Import and export of the legacy JSON ledger format

mod legacy;
mod schema;
mod sqlite;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use legacy::{export_json, import_legacy, LegacyEntry};
pub use sqlite::SqliteLedger;
pub use traits::{Ledger, LedgerError, LedgerResult, Recorded};

use crate::catalog::Pair;
use crate::state::Resolution;

/// An owner row in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub url: String,
    pub pair: Pair,
    pub resolution: Resolution,
    pub error_message: Option<String>,
    pub resolved_at: String,
}

/// A cross-reference row: `url` was also seen under `pair`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    pub url: String,
    pub pair: Pair,
    pub recorded_at: String,
}
