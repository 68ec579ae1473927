//! Output module for run summaries and ledger reports
//!
//! This module handles:
//! - Rendering run summaries and dry-run plans
//! - Reporting ledger statistics

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, LedgerStatistics};
pub use summary::{
    format_plan, format_run_summary, print_plan, print_run_summary, write_run_summary,
};
