//! Run and plan summaries
//!
//! Renders a `RunSummary` as markdown (printed after every run and
//! optionally written to a file) and a `Plan` as plain text for dry runs.

use crate::crawler::{Plan, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of `summary` to `output_path`
///
/// # Arguments
///
/// * `summary` - The finished run
/// * `config_hash` - Hash of the config file the run used
/// * `output_path` - Path where the markdown file should be written
pub fn write_run_summary(
    summary: &RunSummary,
    config_hash: &str,
    output_path: &Path,
) -> std::io::Result<()> {
    let markdown = format_run_summary(summary, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

pub fn print_run_summary(summary: &RunSummary, config_hash: &str) {
    println!("{}", format_run_summary(summary, config_hash));
}

/// Formats a run summary as markdown
pub fn format_run_summary(summary: &RunSummary, config_hash: &str) -> String {
    let mut md = String::new();

    md.push_str("# Catalog Harvest Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    md.push_str(&format!(
        "- **Status**: {}\n",
        if summary.cancelled {
            "cancelled"
        } else {
            "finished"
        }
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", config_hash));

    md.push_str("## Totals\n\n");
    md.push_str(&format!("- **Fetched**: {}\n", summary.fetched()));
    md.push_str(&format!(
        "- **Cross-referenced**: {}\n",
        summary.cross_referenced()
    ));
    md.push_str(&format!("- **Failed**: {}\n", summary.failed()));
    md.push_str(&format!("- **Skipped**: {}\n", summary.skipped()));
    md.push_str(&format!(
        "- **Orphans reconciled**: {}\n\n",
        summary.reconciled
    ));

    if !summary.pairs.is_empty() {
        md.push_str("## Pairs\n\n");
        md.push_str("| Pair | Planned | Captured | Fetched | Cross-ref | Failed | Skipped | Left | Status |\n");
        md.push_str("|------|---------|----------|---------|-----------|--------|---------|------|--------|\n");
        for p in &summary.pairs {
            let status = match (&p.blocked, p.complete) {
                (Some(_), _) => "blocked",
                (None, true) => "complete",
                (None, false) => "incomplete",
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                p.pair,
                p.planned,
                p.already_captured,
                p.fetched,
                p.cross_referenced,
                p.failed,
                p.skipped,
                p.not_dispatched,
                status
            ));
        }
        md.push('\n');
    }

    let blocked: Vec<_> = summary
        .pairs
        .iter()
        .filter_map(|p| p.blocked.as_ref().map(|reason| (&p.pair, reason)))
        .collect();
    if !blocked.is_empty() {
        md.push_str("## Blocked Pairs\n\n");
        for (pair, reason) in blocked {
            md.push_str(&format!("- {}: {}\n", pair, reason));
        }
        md.push('\n');
    }

    md
}

/// Formats a plan as plain text, one block per pair
pub fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();

    out.push_str("=== Harvest Plan ===\n\n");
    for (pair, pair_plan) in &plan.pairs {
        out.push_str(&format!("{}\n", pair));
        if let Some(reason) = &pair_plan.blocked {
            out.push_str(&format!("  blocked: {}\n\n", reason));
            continue;
        }
        out.push_str(&format!(
            "  total: {}, captured: {}, pending: {} in {} batches\n",
            pair_plan.total,
            pair_plan.already_captured,
            pair_plan.pending(),
            pair_plan.batches.len()
        ));
        if !pair_plan.orphans.is_empty() {
            out.push_str(&format!(
                "  orphans to reconcile: {}\n",
                pair_plan.orphans.len()
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Pending: {} URLs in {} batches across {} pairs\n",
        plan.total_pending(),
        plan.total_batches(),
        plan.pairs.len()
    ));
    out
}

pub fn print_plan(plan: &Plan) {
    print!("{}", format_plan(plan));
}
