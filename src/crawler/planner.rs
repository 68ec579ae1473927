//! Work planner
//!
//! Computes, for every pair in the catalog, which URLs still need work and
//! splits them into batches. Planning only reads: it never writes to the
//! ledger or the shard store, so it is safe to run it as a dry run.

use crate::catalog::{CatalogEntry, Pair, PlanResult, PlanningError};
use crate::ledger::Ledger;
use crate::shard::ShardStore;
use std::collections::{BTreeMap, HashSet};

/// A chunk of pending URLs for one pair, handed to the executor as a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub pair: Pair,
    pub entries: Vec<CatalogEntry>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A URL present in a shard of the pair but unknown to the ledger
///
/// Left behind by a crash between the shard write and the ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub url: String,

    /// Owning pair when the shard record is a cross-reference placeholder
    pub owner: Option<Pair>,
}

/// Plan for a single pair
#[derive(Debug, Clone, Default)]
pub struct PairPlan {
    /// Distinct catalog URLs listed under the pair
    pub total: usize,

    /// Catalog URLs already in the ledger or the pair's shards
    pub already_captured: usize,

    pub batches: Vec<Batch>,

    pub orphans: Vec<Orphan>,

    /// Why the pair cannot be worked on this run, if it cannot
    pub blocked: Option<String>,
}

impl PairPlan {
    /// Number of URLs scheduled for work
    pub fn pending(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }
}

/// Plan for a whole run, ordered by pair
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub pairs: BTreeMap<Pair, PairPlan>,
}

impl Plan {
    pub fn total_pending(&self) -> usize {
        self.pairs.values().map(PairPlan::pending).sum()
    }

    pub fn total_batches(&self) -> usize {
        self.pairs.values().map(|p| p.batches.len()).sum()
    }

    pub fn orphans(&self) -> impl Iterator<Item = (&Pair, &Orphan)> {
        self.pairs
            .iter()
            .flat_map(|(pair, plan)| plan.orphans.iter().map(move |o| (pair, o)))
    }
}

/// Plans work against the current ledger and shard state
pub struct WorkPlanner<'a> {
    ledger: &'a dyn Ledger,
    shards: &'a ShardStore,
    batch_size: usize,
}

impl<'a> WorkPlanner<'a> {
    pub fn new(ledger: &'a dyn Ledger, shards: &'a ShardStore, batch_size: usize) -> Self {
        Self {
            ledger,
            shards,
            batch_size,
        }
    }

    /// Builds the plan for `catalog`
    ///
    /// Within a pair the catalog order is kept and repeated URLs collapse to
    /// their first occurrence. A pair whose shards cannot be read is marked
    /// blocked and gets no batches.
    ///
    /// # Returns
    ///
    /// * `Ok(Plan)` - One `PairPlan` per pair in the catalog
    /// * `Err(PlanningError::InvalidBatchSize)` - `batch_size` is 0
    /// * `Err(PlanningError::Ledger)` - The ledger could not be read
    pub fn plan(&self, catalog: &[CatalogEntry]) -> PlanResult<Plan> {
        if self.batch_size == 0 {
            return Err(PlanningError::InvalidBatchSize);
        }

        let mut grouped: BTreeMap<Pair, Vec<CatalogEntry>> = BTreeMap::new();
        for entry in catalog {
            grouped
                .entry(entry.pair.clone())
                .or_default()
                .push(entry.clone());
        }

        let mut plan = Plan::default();
        for (pair, entries) in grouped {
            let pair_plan = self.plan_pair(&pair, entries)?;
            tracing::debug!(
                "Planned {}: {} total, {} captured, {} pending in {} batches",
                pair,
                pair_plan.total,
                pair_plan.already_captured,
                pair_plan.pending(),
                pair_plan.batches.len()
            );
            plan.pairs.insert(pair, pair_plan);
        }

        Ok(plan)
    }

    fn plan_pair(&self, pair: &Pair, entries: Vec<CatalogEntry>) -> PlanResult<PairPlan> {
        let mut seen = HashSet::new();
        let entries: Vec<CatalogEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.url.clone()))
            .collect();

        let mut pair_plan = PairPlan {
            total: entries.len(),
            ..Default::default()
        };

        let records = match self.shards.records_in_pair(pair) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Skipping {}: shard store unreadable: {}", pair, e);
                pair_plan.blocked = Some(e.to_string());
                return Ok(pair_plan);
            }
        };

        let in_ledger = self.ledger.urls_for_pair(pair)?;

        let mut captured = in_ledger.clone();
        for record in &records {
            let Some(url) = record.url() else { continue };
            if captured.insert(url.to_string()) {
                pair_plan.orphans.push(Orphan {
                    url: url.to_string(),
                    owner: record.cross_reference_owner(),
                });
            }
        }

        let pending: Vec<CatalogEntry> = entries
            .into_iter()
            .filter(|e| !captured.contains(&e.url))
            .collect();
        pair_plan.already_captured = pair_plan.total - pending.len();

        pair_plan.batches = pending
            .chunks(self.batch_size)
            .map(|chunk| Batch {
                pair: pair.clone(),
                entries: chunk.to_vec(),
            })
            .collect();

        Ok(pair_plan)
    }
}
