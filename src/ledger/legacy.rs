//! Legacy JSON ledger format
//!
//! Earlier runs kept the ledger as a JSON array of
//! `{url, main_category, sub_category}` objects, one per resolution,
//! appended in order. Importing replays those entries through
//! `record_resolved`, so the first entry for a URL becomes its owner and
//! later ones become cross-references.

use crate::catalog::Pair;
use crate::ledger::traits::{Ledger, LedgerResult, Recorded};
use crate::state::Resolution;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// One entry of the legacy JSON ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEntry {
    pub url: String,
    pub main_category: String,
    pub sub_category: String,
}

/// Imports a legacy JSON ledger, returning how many entries changed the ledger
///
/// The legacy format does not say whether a page was fetched or failed, so
/// owner rows are imported as `fetched`.
pub fn import_legacy(ledger: &dyn Ledger, path: &Path) -> LedgerResult<usize> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<LegacyEntry> = serde_json::from_str(&content)?;

    let mut changed = 0;
    for entry in &entries {
        let pair = Pair::new(entry.main_category.clone(), entry.sub_category.clone());
        match ledger.record_resolved(&entry.url, &pair, Resolution::Fetched, None)? {
            Recorded::Owner | Recorded::CrossReference => changed += 1,
            Recorded::AlreadyPresent | Recorded::Unresolved => {}
        }
    }

    tracing::info!(
        "Imported {} of {} legacy ledger entries from {}",
        changed,
        entries.len(),
        path.display()
    );

    Ok(changed)
}

/// Writes the ledger in the legacy JSON format
///
/// Owner rows come first, followed by cross-references, each group in the
/// order it was recorded. Returns the number of entries written.
pub fn export_json(ledger: &dyn Ledger, path: &Path) -> LedgerResult<usize> {
    let mut entries: Vec<LegacyEntry> = ledger
        .records()?
        .into_iter()
        .map(|r| LegacyEntry {
            url: r.url,
            main_category: r.pair.main_category,
            sub_category: r.pair.sub_category,
        })
        .collect();

    entries.extend(ledger.cross_references()?.into_iter().map(|c| LegacyEntry {
        url: c.url,
        main_category: c.pair.main_category,
        sub_category: c.pair.sub_category,
    }));

    let mut file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(&mut file, &entries)?;
    file.write_all(b"\n")?;
    file.sync_all()?;

    Ok(entries.len())
}
