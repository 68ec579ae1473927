//! Crawler module: planning and running the harvest
//!
//! This module contains the core crawling logic, including:
//! - Work planning against the ledger and shard store
//! - Bounded, cancellable execution of per-URL pipelines
//! - Run coordination across pairs
//! - The page fetching and record extraction seams

mod coordinator;
mod executor;
mod extractor;
mod fetcher;
mod planner;

pub use coordinator::{load_config_catalog, run_harvest, Coordinator, PairSummary, RunSummary};
pub use executor::{BatchReport, BoundedExecutor, ExecutorSettings, UrlOutcome, UrlReport};
pub use extractor::{CourseExtractor, ExtractionError, RecordExtractor};
pub use fetcher::{build_http_client, FetchError, HttpFetcher, PageFetcher};
pub use planner::{Batch, Orphan, PairPlan, Plan, WorkPlanner};
