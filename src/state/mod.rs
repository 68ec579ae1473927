//! State module for tracking URL resolution
//!
//! # Components
//!
//! - `Resolution`: how a URL was resolved, as persisted in the ledger
//! - `LedgerStatus`: what the ledger knows about a URL relative to a pair

mod resolution;

pub use resolution::{LedgerStatus, Resolution};
