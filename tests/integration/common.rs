//! Shared fixtures for the integration tests

use async_trait::async_trait;
use catalog_harvest::config::{CrawlerConfig, ExtractorConfig};
use catalog_harvest::crawler::{Coordinator, CourseExtractor, FetchError, PageFetcher};
use catalog_harvest::ledger::SqliteLedger;
use catalog_harvest::shard::ShardStore;
use catalog_harvest::{CatalogEntry, Pair};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Fetcher serving a minimal course page for every URL
///
/// Counts calls per URL, fails the URLs it was told to fail, and can fire a
/// cancellation token when a given URL is fetched.
#[derive(Default)]
pub struct ScriptedFetcher {
    calls: Mutex<HashMap<String, usize>>,
    failing: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn cancelling_on(url: &str, token: CancellationToken) -> Self {
        Self {
            cancel_on: Some((url.to_string(), token)),
            ..Default::default()
        }
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_calls_per_url(&self) -> usize {
        self.calls.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == url {
                token.cancel();
            }
        }

        if self.failing.contains(url) {
            return Err(FetchError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }

        Ok(course_page(&format!("Course at {}", url)))
    }
}

/// A course page the default extractor can read
pub fn course_page(title: &str) -> String {
    format!(
        r#"<html><body>
             <h1 class="ud-heading-xxl clp-lead__title">{}</h1>
             <div class="clp-lead__headline">A course</div>
           </body></html>"#,
        title
    )
}

pub fn crawler_config(concurrency_limit: u32, batch_size: usize) -> CrawlerConfig {
    CrawlerConfig {
        concurrency_limit,
        batch_size,
        shard_size: 10,
        jitter_min_ms: 0,
        jitter_max_ms: 0,
        fetch_timeout_secs: 5,
    }
}

/// A ledger file and shard directory that outlive single coordinators
pub struct Harness {
    pub dir: TempDir,
    pub fetcher: Arc<ScriptedFetcher>,
}

impl Harness {
    pub fn new(fetcher: ScriptedFetcher) -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("ledger.db")
    }

    pub fn shard_dir(&self) -> PathBuf {
        self.dir.path().join("shards")
    }

    pub fn ledger(&self) -> SqliteLedger {
        SqliteLedger::open(&self.ledger_path()).unwrap()
    }

    pub fn shards(&self) -> ShardStore {
        ShardStore::new(self.shard_dir(), 10)
    }

    /// A fresh coordinator over the same files, as a new process would see
    /// them
    pub fn coordinator(&self, concurrency_limit: u32, batch_size: usize) -> Coordinator {
        Coordinator::new(
            &crawler_config(concurrency_limit, batch_size),
            Arc::new(self.ledger()),
            Arc::new(self.shards()),
            self.fetcher.clone(),
            Arc::new(CourseExtractor::new(&ExtractorConfig::default()).unwrap()),
        )
    }

    /// Contents of every file below the shard directory
    pub fn shard_snapshot(&self) -> BTreeMap<PathBuf, String> {
        let mut files = BTreeMap::new();
        collect(&self.shard_dir(), &mut files);
        files
    }
}

fn collect(dir: &Path, files: &mut BTreeMap<PathBuf, String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(&path, files);
        } else {
            files.insert(path.clone(), std::fs::read_to_string(&path).unwrap());
        }
    }
}

pub fn entries(pair: &Pair, urls: &[&str]) -> Vec<CatalogEntry> {
    urls.iter()
        .map(|u| CatalogEntry::new(pair.clone(), *u))
        .collect()
}
