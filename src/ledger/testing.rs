//! Ledger test doubles

use crate::catalog::Pair;
use crate::ledger::traits::{Ledger, LedgerError, LedgerResult, Recorded};
use crate::ledger::{CrossReference, LedgerRecord, SqliteLedger};
use crate::state::{LedgerStatus, Resolution};
use std::collections::{HashMap, HashSet};

/// In-memory ledger whose writes for one URL always fail
pub(crate) struct UnavailableLedger {
    inner: SqliteLedger,
    failing_url: String,
}

impl UnavailableLedger {
    pub(crate) fn failing_writes_for(url: &str) -> Self {
        Self {
            inner: SqliteLedger::open_in_memory().unwrap(),
            failing_url: url.to_string(),
        }
    }
}

impl Ledger for UnavailableLedger {
    fn status(&self, url: &str, pair: &Pair) -> LedgerResult<LedgerStatus> {
        self.inner.status(url, pair)
    }

    fn record_resolved(
        &self,
        url: &str,
        pair: &Pair,
        resolution: Resolution,
        error_message: Option<&str>,
    ) -> LedgerResult<Recorded> {
        if url == self.failing_url {
            return Err(LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk I/O error",
            )));
        }
        self.inner.record_resolved(url, pair, resolution, error_message)
    }

    fn owner_of(&self, url: &str) -> LedgerResult<Option<Pair>> {
        self.inner.owner_of(url)
    }

    fn urls_for_pair(&self, pair: &Pair) -> LedgerResult<HashSet<String>> {
        self.inner.urls_for_pair(pair)
    }

    fn records(&self) -> LedgerResult<Vec<LedgerRecord>> {
        self.inner.records()
    }

    fn cross_references(&self) -> LedgerResult<Vec<CrossReference>> {
        self.inner.cross_references()
    }

    fn count(&self) -> LedgerResult<u64> {
        self.inner.count()
    }

    fn count_by_resolution(&self) -> LedgerResult<HashMap<Resolution, u64>> {
        self.inner.count_by_resolution()
    }

    fn count_by_pair(&self) -> LedgerResult<Vec<(Pair, u64)>> {
        self.inner.count_by_pair()
    }

    fn start_run(&self, config_hash: &str) -> LedgerResult<Option<String>> {
        self.inner.start_run(config_hash)
    }
}
