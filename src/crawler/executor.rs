//! Bounded executor
//!
//! Runs the per-URL pipeline for one batch with at most
//! `concurrency_limit` pipelines in flight. The semaphore is owned by the
//! executor and shared by every batch it runs, so the bound holds for a
//! whole coordinator run and not just within a batch.
//!
//! Per URL:
//! 1. Re-check the ledger (another task may have resolved it since planning)
//! 2. Already handled for this pair: skip
//! 3. Owned by another pair: write a cross-reference placeholder
//! 4. New: jitter, fetch under a timeout, extract, append to the shard,
//!    then record it in the ledger
//!
//! Fetch, extraction and shard failures are recorded in the ledger as
//! failed so the URL is not attempted again. A placeholder that could not be
//! written is not recorded at all, so a later run retries it. A ledger
//! failure cannot be recorded anywhere and is reported back as
//! `LedgerUnavailable`.

use crate::catalog::Pair;
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::extractor::RecordExtractor;
use crate::crawler::planner::Batch;
use crate::ledger::{Ledger, LedgerError};
use crate::shard::{Appended, ExtractedRecord, ShardStore};
use crate::state::{LedgerStatus, Resolution};
use crate::HarvestError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Pacing and bounds for the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub concurrency_limit: usize,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    pub fetch_timeout: Duration,
}

impl ExecutorSettings {
    /// Random delay in `[jitter_min, jitter_max]`
    fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl From<&CrawlerConfig> for ExecutorSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit as usize,
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }
}

/// What happened to one URL
#[derive(Debug)]
pub enum UrlOutcome {
    /// Fetched and stored; `shard_index` is None if the shard already held it
    Fetched { shard_index: Option<usize> },

    /// Owned by another pair; a placeholder was stored for this pair
    CrossReferenced { owner: Pair },

    /// Already handled for this pair
    Skipped,

    /// Attempted and recorded as failed
    Failed { error: HarvestError },

    /// The ledger could not be read or written
    LedgerUnavailable { error: LedgerError },
}

/// Outcome for a single URL
#[derive(Debug)]
pub struct UrlReport {
    pub url: String,
    pub outcome: UrlOutcome,
}

/// Outcomes for one batch, in batch order
#[derive(Debug)]
pub struct BatchReport {
    pub pair: Pair,
    pub reports: Vec<UrlReport>,

    /// URLs never dispatched because the run was cancelled
    pub not_dispatched: Vec<String>,

    /// Tasks that panicked; their URL is unknown
    pub panicked: usize,
}

impl BatchReport {
    fn new(pair: Pair) -> Self {
        Self {
            pair,
            reports: Vec::new(),
            not_dispatched: Vec::new(),
            panicked: 0,
        }
    }

    pub fn fetched(&self) -> usize {
        self.count(|o| matches!(o, UrlOutcome::Fetched { .. }))
    }

    pub fn cross_referenced(&self) -> usize {
        self.count(|o| matches!(o, UrlOutcome::CrossReferenced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UrlOutcome::Skipped))
    }

    /// Failed URLs, counting panicked tasks
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UrlOutcome::Failed { .. })) + self.panicked
    }

    /// Removes and returns the first ledger failure, if any
    pub fn take_ledger_error(&mut self) -> Option<LedgerError> {
        let position = self
            .reports
            .iter()
            .position(|r| matches!(r.outcome, UrlOutcome::LedgerUnavailable { .. }))?;
        match self.reports.remove(position).outcome {
            UrlOutcome::LedgerUnavailable { error } => Some(error),
            _ => None,
        }
    }

    fn count(&self, predicate: impl Fn(&UrlOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Everything a single URL pipeline needs, shared by all tasks
struct Pipeline {
    ledger: Arc<dyn Ledger>,
    shards: Arc<ShardStore>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn RecordExtractor>,
    settings: ExecutorSettings,
}

impl Pipeline {
    async fn process(&self, pair: &Pair, url: &str) -> UrlOutcome {
        let status = match self.ledger.status(url, pair) {
            Ok(status) => status,
            Err(error) => return UrlOutcome::LedgerUnavailable { error },
        };

        match status {
            LedgerStatus::SameCategory => {
                tracing::debug!("Skipping {}: already resolved for {}", url, pair);
                UrlOutcome::Skipped
            }
            LedgerStatus::CrossCategory { owner } => self.cross_reference(pair, url, owner),
            LedgerStatus::New => self.fetch_and_store(pair, url).await,
        }
    }

    fn cross_reference(&self, pair: &Pair, url: &str, owner: Pair) -> UrlOutcome {
        let record = ExtractedRecord::cross_reference(url, &owner);
        if let Err(e) = self.shards.append(pair, record) {
            // Left unrecorded so the next run writes the placeholder again
            let error = HarvestError::from(e);
            tracing::warn!("Placeholder for {} not written: {}", url, error);
            return UrlOutcome::Failed { error };
        }

        match self
            .ledger
            .record_resolved(url, pair, Resolution::CrossReference, None)
        {
            Ok(_) => {
                tracing::info!("Cross-referenced {} (owned by {})", url, owner);
                UrlOutcome::CrossReferenced { owner }
            }
            Err(error) => UrlOutcome::LedgerUnavailable { error },
        }
    }

    async fn fetch_and_store(&self, pair: &Pair, url: &str) -> UrlOutcome {
        tokio::time::sleep(self.settings.jitter()).await;

        let record = match self.fetch_and_extract(url).await {
            Ok(record) => record,
            Err(e) => return self.fail(pair, url, e),
        };

        let shard_index = match self.shards.append(pair, record) {
            Ok(Appended::Written { index }) => Some(index),
            Ok(Appended::Duplicate) => None,
            Err(e) => return self.fail(pair, url, e.into()),
        };

        match self.ledger.record_resolved(url, pair, Resolution::Fetched, None) {
            Ok(_) => {
                tracing::info!("Fetched {}", url);
                UrlOutcome::Fetched { shard_index }
            }
            Err(error) => UrlOutcome::LedgerUnavailable { error },
        }
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<ExtractedRecord, HarvestError> {
        let html = tokio::time::timeout(self.settings.fetch_timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })??;

        Ok(self.extractor.extract(url, &html)?)
    }

    fn fail(&self, pair: &Pair, url: &str, error: HarvestError) -> UrlOutcome {
        tracing::warn!("Failed {}: {}", url, error);
        let message = error.to_string();
        match self
            .ledger
            .record_resolved(url, pair, Resolution::Failed, Some(&message))
        {
            Ok(_) => UrlOutcome::Failed { error },
            Err(error) => UrlOutcome::LedgerUnavailable { error },
        }
    }
}

/// Runs batches with a global bound on concurrent pipelines
pub struct BoundedExecutor {
    pipeline: Arc<Pipeline>,
    semaphore: Arc<Semaphore>,
}

impl BoundedExecutor {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        shards: Arc<ShardStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn RecordExtractor>,
        settings: ExecutorSettings,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.concurrency_limit.max(1)));
        Self {
            pipeline: Arc::new(Pipeline {
                ledger,
                shards,
                fetcher,
                extractor,
                settings,
            }),
            semaphore,
        }
    }

    /// Runs every URL of `batch` and waits for all of them
    ///
    /// Once `cancel` fires no further URL is dispatched; URLs already
    /// dispatched run to completion before this returns.
    pub async fn run(&self, batch: &Batch, cancel: &CancellationToken) -> BatchReport {
        let mut report = BatchReport::new(batch.pair.clone());
        let mut tasks = JoinSet::new();

        for (position, entry) in batch.entries.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = self.semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                report.not_dispatched = batch.entries[position..]
                    .iter()
                    .map(|e| e.url.clone())
                    .collect();
                tracing::info!(
                    "Stopped dispatching {}: {} URLs left",
                    batch.pair,
                    report.not_dispatched.len()
                );
                break;
            };

            let pipeline = Arc::clone(&self.pipeline);
            let pair = batch.pair.clone();
            let url = entry.url.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let outcome = pipeline.process(&pair, &url).await;
                (position, UrlReport { url, outcome })
            });
        }

        let mut finished = Vec::with_capacity(batch.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(e) => {
                    tracing::error!("URL task for {} did not complete: {}", batch.pair, e);
                    report.panicked += 1;
                }
            }
        }

        finished.sort_by_key(|(position, _)| *position);
        report.reports = finished.into_iter().map(|(_, r)| r).collect();
        report
    }
}
