//! Statistics generation from the ledger
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the ledger.

use crate::catalog::Pair;
use crate::ledger::{Ledger, LedgerResult};
use crate::state::Resolution;
use std::collections::HashMap;

/// Ledger statistics summary
#[derive(Debug, Clone)]
pub struct LedgerStatistics {
    /// Number of URLs with an owner row
    pub total_urls: u64,

    /// Owner rows by resolution
    pub by_resolution: HashMap<Resolution, u64>,

    /// Number of cross-reference rows
    pub cross_references: u64,

    /// Owner rows per pair, sorted by pair
    pub by_pair: Vec<(Pair, u64)>,
}

impl LedgerStatistics {
    pub fn count(&self, resolution: Resolution) -> u64 {
        self.by_resolution.get(&resolution).copied().unwrap_or(0)
    }

    /// Share of owned URLs that were fetched successfully, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            return 0.0;
        }
        self.count(Resolution::Fetched) as f64 / self.total_urls as f64 * 100.0
    }
}

/// Loads statistics from the ledger
///
/// # Arguments
///
/// * `ledger` - The ledger to query
///
/// # Returns
///
/// * `Ok(LedgerStatistics)` - Successfully loaded statistics
/// * `Err(LedgerError)` - Failed to query the ledger
pub fn load_statistics(ledger: &dyn Ledger) -> LedgerResult<LedgerStatistics> {
    Ok(LedgerStatistics {
        total_urls: ledger.count()?,
        by_resolution: ledger.count_by_resolution()?,
        cross_references: ledger.cross_references()?.len() as u64,
        by_pair: ledger.count_by_pair()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Ledger Statistics ===\n");

    println!("Overview:");
    println!("  URLs resolved: {}", stats.total_urls);
    println!("  Cross-references: {}", stats.cross_references);
    println!();

    println!("URLs by Resolution:");
    for resolution in Resolution::all() {
        let count = stats.count(resolution);
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", resolution, count, percentage);
    }
    println!();

    if !stats.by_pair.is_empty() {
        println!("URLs by Pair ({}):", stats.by_pair.len());
        for (pair, count) in &stats.by_pair {
            println!("  {}: {}", pair, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} URLs fetched)",
        stats.success_rate(),
        stats.count(Resolution::Fetched),
        stats.total_urls
    );
}
