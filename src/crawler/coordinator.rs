//! Crawl coordinator - run orchestration
//!
//! A run is:
//! 1. Plan every pair against the ledger and shard store
//! 2. Reconcile orphans (shard records the ledger never heard of)
//! 3. For each pair in order, run its batches, then close the pair's
//!    current shard
//!
//! Pairs run one after another through the same executor, so every fetch
//! shares one concurrency budget and a URL can never be in flight under two
//! pairs at once. Nothing about a run is persisted besides the ledger and
//! the shards; the next run simply plans again.

use crate::catalog::{load_catalog, CatalogEntry, Pair, PlanResult};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::executor::{BatchReport, BoundedExecutor, ExecutorSettings};
use crate::crawler::extractor::{CourseExtractor, RecordExtractor};
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::planner::{Plan, PairPlan, WorkPlanner};
use crate::ledger::{Ledger, LedgerResult, SqliteLedger};
use crate::shard::ShardStore;
use crate::state::Resolution;
use crate::{HarvestError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-pair outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSummary {
    pub pair: Pair,

    /// URLs scheduled for this run
    pub planned: usize,

    /// URLs already captured before the run
    pub already_captured: usize,

    pub fetched: usize,
    pub cross_referenced: usize,
    pub failed: usize,
    pub skipped: usize,

    /// Scheduled URLs left untouched because the run was cancelled
    pub not_dispatched: usize,

    /// Every scheduled URL was dispatched
    pub complete: bool,

    /// Why the pair was not worked on, if it was not
    pub blocked: Option<String>,
}

impl PairSummary {
    fn from_plan(pair: Pair, plan: &PairPlan) -> Self {
        Self {
            pair,
            planned: plan.pending(),
            already_captured: plan.already_captured,
            fetched: 0,
            cross_referenced: 0,
            failed: 0,
            skipped: 0,
            not_dispatched: 0,
            complete: false,
            blocked: plan.blocked.clone(),
        }
    }

    fn absorb(&mut self, report: &BatchReport) {
        self.fetched += report.fetched();
        self.cross_referenced += report.cross_referenced();
        self.failed += report.failed();
        self.skipped += report.skipped();
        self.not_dispatched += report.not_dispatched.len();
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pairs: Vec<PairSummary>,

    /// Orphaned shard records written back into the ledger
    pub reconciled: usize,

    /// The run stopped early on cancellation
    pub cancelled: bool,

    pub elapsed: Duration,
}

impl RunSummary {
    pub fn fetched(&self) -> usize {
        self.pairs.iter().map(|p| p.fetched).sum()
    }

    pub fn cross_referenced(&self) -> usize {
        self.pairs.iter().map(|p| p.cross_referenced).sum()
    }

    pub fn failed(&self) -> usize {
        self.pairs.iter().map(|p| p.failed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.pairs.iter().map(|p| p.skipped).sum()
    }

    pub fn incomplete_pairs(&self) -> impl Iterator<Item = &PairSummary> {
        self.pairs.iter().filter(|p| !p.complete)
    }
}

/// Main coordinator structure
pub struct Coordinator {
    ledger: Arc<dyn Ledger>,
    shards: Arc<ShardStore>,
    executor: BoundedExecutor,
    batch_size: usize,
}

impl Coordinator {
    /// Creates a coordinator from its parts
    ///
    /// # Arguments
    ///
    /// * `config` - Pacing, batch size and concurrency limit
    /// * `ledger` - Durable record of resolved URLs
    /// * `shards` - Output store
    /// * `fetcher` - Source of page HTML
    /// * `extractor` - Turns HTML into records
    pub fn new(
        config: &CrawlerConfig,
        ledger: Arc<dyn Ledger>,
        shards: Arc<ShardStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn RecordExtractor>,
    ) -> Self {
        let executor = BoundedExecutor::new(
            Arc::clone(&ledger),
            Arc::clone(&shards),
            fetcher,
            extractor,
            ExecutorSettings::from(config),
        );

        Self {
            ledger,
            shards,
            executor,
            batch_size: config.batch_size,
        }
    }

    /// Creates a coordinator with the SQLite ledger, the HTTP fetcher and
    /// the course extractor described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let ledger = SqliteLedger::open(Path::new(&config.output.ledger_path))?;
        Self::with_ledger(config, ledger)
    }

    /// Like `from_config`, but never creates the ledger file
    ///
    /// An existing ledger is opened; a missing one is replaced by an empty
    /// in-memory ledger, so planning leaves the disk as it found it.
    pub fn for_planning(config: &Config) -> Result<Self> {
        let path = Path::new(&config.output.ledger_path);
        let ledger = if path.exists() {
            SqliteLedger::open(path)?
        } else {
            tracing::debug!("No ledger at {}, planning against an empty one", path.display());
            SqliteLedger::open_in_memory()?
        };
        Self::with_ledger(config, ledger)
    }

    fn with_ledger(config: &Config, ledger: SqliteLedger) -> Result<Self> {
        let shards = ShardStore::new(&config.output.shard_dir, config.crawler.shard_size);
        let fetcher = HttpFetcher::new(
            &config.user_agent,
            Duration::from_secs(config.crawler.fetch_timeout_secs),
        )?;
        let extractor = CourseExtractor::new(&config.extractor)?;

        Ok(Self::new(
            &config.crawler,
            Arc::new(ledger),
            Arc::new(shards),
            Arc::new(fetcher),
            Arc::new(extractor),
        ))
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    pub fn shards(&self) -> &ShardStore {
        &self.shards
    }

    /// Plans `catalog` without touching any state
    pub fn plan(&self, catalog: &[CatalogEntry]) -> PlanResult<Plan> {
        WorkPlanner::new(self.ledger.as_ref(), &self.shards, self.batch_size).plan(catalog)
    }

    /// Writes every orphan of `plan` into the ledger
    ///
    /// An orphan is a shard record whose ledger write never happened. A
    /// plain record is recorded as fetched under its pair; a cross-reference
    /// placeholder restores both the owner and the cross-reference.
    pub fn reconcile(&self, plan: &Plan) -> LedgerResult<usize> {
        let mut reconciled = 0;

        for (pair, orphan) in plan.orphans() {
            match &orphan.owner {
                None => {
                    self.ledger
                        .record_resolved(&orphan.url, pair, Resolution::Fetched, None)?;
                }
                Some(owner) => {
                    self.ledger
                        .record_resolved(&orphan.url, owner, Resolution::Fetched, None)?;
                    self.ledger.record_resolved(
                        &orphan.url,
                        pair,
                        Resolution::CrossReference,
                        None,
                    )?;
                }
            }
            tracing::debug!("Reconciled orphan {} for {}", orphan.url, pair);
            reconciled += 1;
        }

        if reconciled > 0 {
            tracing::info!("Reconciled {} orphaned shard records into the ledger", reconciled);
        }
        Ok(reconciled)
    }

    /// Runs the crawl loop for `catalog`
    ///
    /// Returns once every planned URL was dispatched and finished, or once
    /// `cancel` fired and in-flight work drained. A ledger failure aborts the
    /// run with `HarvestError::Ledger` after the current batch drains.
    pub async fn run(
        &self,
        catalog: &[CatalogEntry],
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let start_time = Instant::now();

        let plan = self.plan(catalog)?;
        tracing::info!(
            "Planned {} pairs: {} URLs pending in {} batches",
            plan.pairs.len(),
            plan.total_pending(),
            plan.total_batches()
        );

        let mut summary = RunSummary {
            reconciled: self.reconcile(&plan)?,
            ..Default::default()
        };

        for (pair, pair_plan) in &plan.pairs {
            let mut pair_summary = PairSummary::from_plan(pair.clone(), pair_plan);

            if pair_summary.blocked.is_some() {
                summary.pairs.push(pair_summary);
                continue;
            }

            if !pair_plan.batches.is_empty() {
                tracing::info!(
                    "Processing {}: {} pending, {} already captured",
                    pair,
                    pair_plan.pending(),
                    pair_plan.already_captured
                );
            }

            let batch_count = pair_plan.batches.len();
            for (i, batch) in pair_plan.batches.iter().enumerate() {
                if cancel.is_cancelled() {
                    pair_summary.not_dispatched += batch.len();
                    continue;
                }

                let mut report = self.executor.run(batch, cancel).await;
                let ledger_error = report.take_ledger_error();
                pair_summary.absorb(&report);

                if let Some(e) = ledger_error {
                    tracing::error!("Ledger unavailable during {}: {}", pair, e);
                    self.shards.seal(pair)?;
                    return Err(HarvestError::Ledger(e));
                }

                tracing::info!(
                    "{}: batch {}/{} done ({} fetched, {} cross-referenced, {} failed, {} skipped)",
                    pair,
                    i + 1,
                    batch_count,
                    report.fetched(),
                    report.cross_referenced(),
                    report.failed(),
                    report.skipped()
                );
            }

            // No more items arrive for this pair in this run
            self.shards.seal(pair)?;

            pair_summary.complete = pair_summary.not_dispatched == 0;
            summary.pairs.push(pair_summary);
        }

        summary.cancelled = cancel.is_cancelled();
        summary.elapsed = start_time.elapsed();

        tracing::info!(
            "Run finished in {:?}: {} fetched, {} cross-referenced, {} failed, {} skipped{}",
            summary.elapsed,
            summary.fetched(),
            summary.cross_referenced(),
            summary.failed(),
            summary.skipped(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );

        Ok(summary)
    }
}

/// Loads the catalog named by `config`, logging entries that were skipped
pub fn load_config_catalog(config: &Config) -> Result<Vec<CatalogEntry>> {
    let load = load_catalog(Path::new(&config.input.catalog_dir))?;
    for problem in &load.skipped {
        tracing::warn!("Skipping catalog input: {}", problem);
    }
    tracing::info!(
        "Loaded {} catalog entries from {}",
        load.entries.len(),
        config.input.catalog_dir
    );
    Ok(load.entries)
}

/// Runs a complete harvest from a config
///
/// This is the main entry point. It will:
/// 1. Load the catalog directory
/// 2. Open the ledger and shard store
/// 3. Plan, reconcile and work through every pair
pub async fn run_harvest(config: &Config, cancel: &CancellationToken) -> Result<RunSummary> {
    let catalog = load_config_catalog(config)?;
    let coordinator = Coordinator::from_config(config)?;
    coordinator.run(&catalog, cancel).await
}
